//! Wire types for the telemetry API.

use crate::model::ORDER_ID_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Create payload for a sensor type.
///
/// `json_keys`, `json_labels`, `data_types` and `metrics` are aligned
/// arrays: index `i` describes one schema field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorTypePayload {
    pub name: String,
    pub description: String,
    pub external: bool,
    pub radio_id: String,
    pub json_keys: Vec<String>,
    pub json_labels: Vec<String>,
    pub data_types: Vec<String>,
    pub metrics: Vec<String>,
}

/// Sensor type as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorTypeResource {
    pub type_id: String,
    #[serde(default)]
    pub radio_id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SensorTypeResource {
    /// Natural-key match; the service echoes `radioId` back as either a
    /// string or a number.
    pub fn matches(&self, radio_id: &str) -> bool {
        match &self.radio_id {
            Some(Value::String(s)) => s == radio_id,
            Some(other) => other.to_string() == radio_id,
            None => false,
        }
    }
}

/// Create payload for an import check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCheckPayload {
    pub name: String,
    pub description: String,
    /// Remote `typeId` of the owning sensor type
    pub sensor_type: String,
    pub enabled: bool,
    pub source_id: String,
    pub timezone: String,
    pub notification_relevance: u32,
}

/// Import check as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCheckResource {
    pub check_id: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One reading event in an ingest batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEvent {
    pub check_id: String,
    pub data: BTreeMap<String, Value>,
    /// RFC3339, seconds precision
    pub timestamp: String,
    pub status: String,
}

/// Accepted/failed event counts in an ingest response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    #[serde(default)]
    pub accepted_event_count: u64,
    #[serde(default)]
    pub failed_event_count: u64,
}

/// Handle returned by the data-upload endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResource {
    pub upload_id: String,
}

/// Recent samples for one check, used by the advisory existing-sample
/// cross-check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStats {
    #[serde(default)]
    pub samples: Vec<StatSample>,
}

/// One recent sample in a stats response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSample {
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl CheckStats {
    /// Order ids already present in the service's recent history.
    pub fn order_ids(&self) -> impl Iterator<Item = &str> {
        self.samples
            .iter()
            .filter_map(|sample| sample.data.get(ORDER_ID_FIELD).and_then(Value::as_str))
    }
}
