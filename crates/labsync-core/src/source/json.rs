//! JSON snapshot row source.

use crate::error::{Result, SyncError};
use crate::model::RawRow;
use crate::sync::RowSource;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Reads raw rows from a JSON array snapshot file.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for JsonFileSource {
    async fn read_all(&self) -> Result<Vec<RawRow>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SyncError::source(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let rows: Vec<RawRow> = serde_json::from_str(&raw)?;
        info!(count = rows.len(), path = %self.path.display(), "read raw rows");
        Ok(rows)
    }
}
