//! Row source adapters.
//!
//! The pipeline reads through the [`crate::sync::RowSource`] trait; the
//! adapters here cover the two supported sources-of-record: a JSON
//! snapshot file and (behind the `database` feature) a SQL table scan.

mod json;
#[cfg(feature = "database")]
mod sql;

pub use json::JsonFileSource;
#[cfg(feature = "database")]
pub use sql::SqlSource;
