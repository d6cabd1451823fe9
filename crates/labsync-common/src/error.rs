//! Error types shared across labsync crates.

use thiserror::Error;

/// Result type alias for shared labsync operations.
pub type Result<T> = std::result::Result<T, LabsyncError>;

/// Base error type for labsync.
///
/// The pipeline crate wraps this with its own remote-facing variants;
/// these are the failures that can occur before any network call is made.
#[derive(Error, Debug)]
pub enum LabsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LabsyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
