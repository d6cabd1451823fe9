//! Metrics-sink boundary.
//!
//! Counters are reported through an explicit handle passed into the
//! Transformer and Publisher rather than a process-wide singleton, so
//! tests can assert on them and binaries choose the backend once at
//! startup.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Counter names used by the pipeline.
pub mod counters {
    pub const ROWS_DROPPED: &str = "sync.rows.dropped";
    pub const ATTACHMENT_MISSING: &str = "sync.attachment.missing";
    pub const SENSOR_TYPE_CREATED: &str = "sync.sensor_type.created";
    pub const SENSOR_TYPE_SHARED: &str = "sync.sensor_type.shared";
    pub const SENSOR_TYPE_FAILED: &str = "sync.sensor_type.failed";
    pub const IMPORT_CHECK_CREATED: &str = "sync.import_check.created";
    pub const IMPORT_CHECK_FAILED: &str = "sync.import_check.failed";
    pub const INGEST_ACCEPTED: &str = "sync.ingest.accepted";
    pub const INGEST_FAILED: &str = "sync.ingest.failed";
    pub const INGEST_SKIPPED: &str = "sync.ingest.skipped";
}

/// Counter sink the pipeline reports through.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, counter: &str);
}

/// Production sink: counters surface as structured log events.
#[derive(Debug, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn incr(&self, counter: &str) {
        debug!(counter, "metric");
    }
}

/// In-memory recorder for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counts: Mutex<HashMap<String, u64>>,
}

impl RecordingMetrics {
    pub fn get(&self, counter: &str) -> u64 {
        self.counts
            .lock()
            .map(|counts| counts.get(counter).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl MetricsSink for RecordingMetrics {
    fn incr(&self, counter: &str) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(counter.to_string()).or_insert(0) += 1;
        }
    }
}
