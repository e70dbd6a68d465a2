//! The list-view query engine: filtering, timestamp ordering and summary aggregates.
//!
//! Every list screen runs the same pipeline on each change of its inputs:
//!
//! ```text
//! records -> FilterCriteria (search AND selections AND date range)
//!         -> SortOrder (optional, stable)
//!         -> visible rows
//! records + visible rows -> AggregateSpec list -> summary cards
//! ```
//!
//! Nothing is cached; each step re-scans the (small) record set.

pub mod aggregate;
pub mod filter;
pub mod sort;

pub use aggregate::{
    compute_aggregates, AggregateSource, AggregateSpec, AggregateValue, Aggregates, Measure,
};
pub use filter::{DateRange, FilterCriteria, Filterable, Selection};
pub use sort::{sort_by_timestamp, SortOrder};
