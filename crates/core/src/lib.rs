//! # LIS Core
//!
//! Core logic for the laboratory information system dashboards.
//!
//! This crate holds every behaviour the dashboards expose, independent of how they are drawn:
//! - The filter, sort and aggregate engine shared by all list views
//! - Generic list views with create/edit/delete dialogs, notices and audit trails
//! - Record types per module, including the instrument mode change guard and HL7 export
//! - Role-scoped dashboards and their overview cards
//! - Startup configuration and seed data loading
//!
//! **No presentation concerns**: rendering and argument parsing belong in `lis-cli`.

#[macro_use]
mod macros;

pub mod access;
pub mod audit;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod dates;
pub mod error;
pub mod models;
pub mod notices;
pub mod query;
pub mod seed;
pub mod store;
pub mod validation;
pub mod view;

pub use access::{Action, Capabilities, Module, Role};
pub use audit::{AuditAction, AuditLog, AuditTrail};
pub use config::CoreConfig;
pub use dashboard::{Dashboard, DashboardOverview, SummaryCard, Tab};
pub use error::{FormErrors, LisError, LisResult};
pub use notices::{Notice, NoticeLevel, Notices};
pub use query::{AggregateSource, AggregateSpec, Aggregates, FilterCriteria, Selection, SortOrder};
pub use seed::SeedData;
pub use store::{InMemoryRepository, Record, Repository};
pub use view::{Dialog, Editable, ListView, StatusBearing};
