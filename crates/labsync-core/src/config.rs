//! Pipeline configuration.
//!
//! Loaded from a configuration file layered with `LABSYNC_*` environment
//! overrides. Malformed or incomplete configuration is a fatal startup
//! error; everything here is validated before the first network call.

use crate::model::Tenant;
use labsync_common::{LabsyncError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default public API endpoint of the telemetry service.
pub const DEFAULT_API_BASE_URL: &str = "https://api.30mhz.com/api";

/// Default HTTP timeout for telemetry API requests, in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Metric table entry every configuration must provide.
pub const DEFAULT_METRIC_KEY: &str = "default";

/// Full pipeline configuration for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Telemetry API endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Tenant under which shared entities are created, and the fallback
    /// for rows whose tenant hint cannot be resolved
    pub default_tenant: Tenant,

    /// Source relation id -> tenant credentials
    #[serde(default)]
    pub tenants: HashMap<String, Tenant>,

    /// Package code -> display name; rows with unlisted codes are out of
    /// scope
    pub packages: HashMap<String, String>,

    /// Result code -> metric label; must contain the `default` entry
    pub metrics: HashMap<String, String>,

    /// Version tag folded into sensor-type ids; may be empty
    #[serde(default)]
    pub schema_version: String,

    /// Recency window: rows older than this many days are out of scope
    pub window_days: i64,

    /// Path of the persisted already-synced ledger
    pub ledger_path: PathBuf,

    /// Document-retrieval service settings
    pub documents: DocumentConfig,

    /// Row source settings
    pub source: SourceConfig,
}

/// Telemetry API endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Document-retrieval service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    pub base_url: String,
}

/// Row source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON snapshot file of raw rows
    Json { path: PathBuf },
    /// One-table scan over a SQL source (requires the `database` feature)
    Sql { url: String, table: String },
}

impl SyncConfig {
    /// Load from a configuration file, layered with `LABSYNC_*`
    /// environment overrides (e.g. `LABSYNC_API__BASE_URL`).
    pub fn load(path: &Path) -> Result<Self> {
        let loaded = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("LABSYNC").separator("__"))
            .build()
            .map_err(|e| LabsyncError::config(e.to_string()))?;

        let config: SyncConfig = loaded
            .try_deserialize()
            .map_err(|e| LabsyncError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.packages.is_empty() {
            return Err(LabsyncError::config("package table must not be empty"));
        }
        if !self.metrics.contains_key(DEFAULT_METRIC_KEY) {
            return Err(LabsyncError::config(
                "metric table must contain a `default` entry",
            ));
        }
        if self.window_days <= 0 {
            return Err(LabsyncError::config("window_days must be positive"));
        }
        Ok(())
    }

    /// Resolve a row's tenant hint, falling back to the default tenant.
    pub fn resolve_tenant(&self, relation_id: Option<&str>) -> Tenant {
        relation_id
            .and_then(|rid| self.tenants.get(rid))
            .cloned()
            .unwrap_or_else(|| self.default_tenant.clone())
    }

    /// Metric label for a result code, falling back to the configured
    /// default entry.
    pub fn metric_for(&self, code: &str) -> String {
        self.metrics
            .get(code)
            .or_else(|| self.metrics.get(DEFAULT_METRIC_KEY))
            .cloned()
            .unwrap_or_default()
    }
}
