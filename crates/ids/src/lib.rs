//! Record identifier generation.
//!
//! Every record created from a dashboard dialog gets a fabricated identifier. Two schemes are in
//! use:
//! - **Sequential** identifiers such as `TO-004`, continuing after the highest sequence already
//!   present in a seeded collection.
//! - **Timestamp-derived** identifiers such as `AUD-20240115103000123`, which are strictly
//!   increasing even when two records are created within the same millisecond.
//!
//! Generators take the current time as an argument so that callers (and tests) control the
//! clock.

mod service;

pub use service::{IdGenerator, SequentialIds, TimestampIds};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
