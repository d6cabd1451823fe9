//! Canonical entity model for the transform-and-publish pipeline.
//!
//! Raw source rows are normalized into three tenant-scoped entities:
//! [`SensorType`] (one remote schema per analysis package),
//! [`ImportCheck`] (one ingestion channel per sample stream) and
//! [`IngestRecord`] (one timestamped reading batch).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved schema field carrying the uploaded attachment handle.
pub const ATTACHMENT_FIELD: &str = "file";

/// Extra ingest fields added next to the raw result values.
pub const DATETIME_FIELD: &str = "datetime";
pub const SAMPLE_CODE_FIELD: &str = "sample_code";
pub const ORDER_ID_FIELD: &str = "order_id";

/// Placeholder used in composite import-check ids when a row has no
/// external object code.
pub const UNKNOWN_OBJECT_CODE: &str = "unknown";

/// One analysis result row as read from the source-of-record.
///
/// Rows are transient: they live between the source read and the
/// transformation and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    pub order_id: String,
    pub sample_id: String,
    pub sample_code: String,
    /// The lab's code identifying which analysis panel produced this row.
    pub package_code: String,
    pub sample_date: DateTime<Utc>,
    /// Tenant hint; resolved against the configured tenant table.
    #[serde(default)]
    pub relation_id: Option<String>,
    /// External object code used to build composite import-check ids.
    #[serde(default)]
    pub object_code: Option<String>,
    /// Key for the document-retrieval service.
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub result_points: Vec<ResultPoint>,
}

/// One `(code, description, value, unit)` measurement within a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPoint {
    pub code: String,
    pub description: String,
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Remote account that owns created entities.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tenant {
    pub api_key: String,
    pub organization: String,
}

/// Field value types the telemetry service distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Double,
    String,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Double => "double",
            FieldType::String => "string",
        }
    }
}

/// Infer the telemetry field type for a raw result value.
///
/// Numbers and numeric-looking strings map to `double`; everything else
/// stays `string`.
pub fn infer_type(value: &Value) -> FieldType {
    match value {
        Value::Number(_) => FieldType::Double,
        Value::String(s) if s.trim().parse::<f64>().is_ok() => FieldType::Double,
        _ => FieldType::String,
    }
}

/// One field in a sensor-type schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: String,
    pub field_type: FieldType,
    pub metric: String,
}

/// Remote schema definition for one analysis package.
#[derive(Debug, Clone)]
pub struct SensorType {
    pub id: String,
    pub name: String,
    pub tenant: Tenant,
    /// Ordered `field code -> spec` mapping; iteration order drives the
    /// aligned key/label/type/metric arrays in the create payload.
    pub schema: BTreeMap<String, FieldSpec>,
}

/// Named remote ingestion channel bound to one sensor type and tenant.
#[derive(Debug, Clone)]
pub struct ImportCheck {
    pub id: String,
    pub name: String,
    pub sensor_type_id: String,
    pub tenant: Tenant,
}

/// One timestamped reading batch submitted against an import check.
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub import_check_id: String,
    /// Originating order id, used for ledger bookkeeping.
    pub order_id: String,
    pub tenant: Tenant,
    pub data: BTreeMap<String, Value>,
    /// Raw attachment bytes; replaced by an upload handle at publish time.
    pub attachment: Option<Vec<u8>>,
    /// The row's sample date, truncated to whole seconds.
    pub timestamp: DateTime<Utc>,
}

/// Sensor-type identity: the package code, suffixed with the configured
/// schema-version tag when one is set.
pub fn sensor_type_id(package_code: &str, schema_version: &str) -> String {
    if schema_version.is_empty() {
        package_code.to_string()
    } else {
        format!("{package_code}-{schema_version}")
    }
}

/// Import-check identity: composite of the external object code (or the
/// literal placeholder) and the owning sensor-type id.
pub fn import_check_id(object_code: Option<&str>, sensor_type_id: &str) -> String {
    format!(
        "{} - {}",
        object_code.unwrap_or(UNKNOWN_OBJECT_CODE),
        sensor_type_id
    )
}

/// Truncate a timestamp to whole seconds.
pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}
