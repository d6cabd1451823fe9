//! Error types for the pipeline.

use crate::documents::DocumentError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Pipeline error taxonomy.
///
/// Fatal variants abort a run; everything the publisher catches at an
/// entity boundary is logged and counted instead of propagated.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Shared base errors (IO, configuration, parsing)
    #[error(transparent)]
    Common(#[from] labsync_common::LabsyncError),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the telemetry API
    #[error("telemetry API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document-retrieval failure
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Referenced sensor type is not resolvable under the default tenant
    #[error("sensor type {0} is not resolvable")]
    SensorTypeUnresolved(String),

    /// Referenced import check is not resolvable
    #[error("import check {0} is not resolvable")]
    ImportCheckUnresolved(String),

    /// The service reported failed events for an ingest batch
    #[error("ingest batch rejected: {failed} failed, {accepted} accepted")]
    IngestRejected { accepted: u64, failed: u64 },

    /// Row source failure
    #[error("source error: {0}")]
    Source(String),
}

impl SyncError {
    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}
