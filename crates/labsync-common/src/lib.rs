//! Labsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error and logging infrastructure for the labsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the base error taxonomy used by the pipeline
//! - **Logging**: a centralized `tracing` bootstrap with console/file
//!   output, text/JSON formats, and environment-based configuration
//!
//! # Example
//!
//! ```no_run
//! use labsync_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env().unwrap_or_default();
//!     init_logging(&config)?;
//!     info!("started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{LabsyncError, Result};
