//! Labsync Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Transform-and-publish pipeline moving laboratory analysis results into
//! a multi-tenant telemetry platform.
//!
//! # Overview
//!
//! One run reads raw result rows from a source-of-record, normalizes them
//! into a canonical three-entity model, and publishes that model to the
//! remote telemetry service in dependency order:
//!
//! - **Sensor types**: one remote schema per analysis package
//! - **Import checks**: one ingestion channel per sample stream
//! - **Ingest records**: timestamped reading batches
//!
//! Cross-run idempotence comes from a persisted [`ledger::Ledger`] of
//! confirmed order ids plus an advisory remote cross-check; per-item
//! failures are isolated, logged, and retried on the next run.
//!
//! # Example
//!
//! ```no_run
//! use labsync_core::ledger::Ledger;
//! use labsync_core::source::JsonFileSource;
//! use labsync_core::sync::Pipeline;
//!
//! # async fn run(transformer: labsync_core::transform::Transformer,
//! #              publisher: labsync_core::publish::Publisher) -> labsync_core::Result<()> {
//! let source = JsonFileSource::new("rows.json");
//! let ledger = Ledger::new("synced.txt");
//! let report = Pipeline::new(source, transformer, publisher, ledger)
//!     .run()
//!     .await?;
//! println!("{} confirmed", report.confirmed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod documents;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod publish;
pub mod source;
pub mod sync;
pub mod telemetry;
pub mod transform;

// Re-export commonly used types
pub use error::{Result, SyncError};
pub use sync::{Pipeline, RowSource, SyncReport, TelemetrySink};
