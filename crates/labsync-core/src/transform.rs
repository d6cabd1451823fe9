//! Transformation of raw source rows into the canonical model.
//!
//! Rows are filtered (scope, already-synced, empty results), partitioned
//! by tenant, and folded into deduplicated sensor types, import checks
//! and ingest records. Schema derivation is widening-only: when two
//! candidate definitions share a sensor-type id, the one with more
//! fields wins, so a partial row can never narrow an already-derived
//! schema.

use crate::config::SyncConfig;
use crate::documents::DocumentStore;
use crate::error::Result;
use crate::metrics::{counters, MetricsSink};
use crate::model::{
    import_check_id, infer_type, sensor_type_id, truncate_to_seconds, FieldSpec, FieldType,
    ImportCheck, IngestRecord, RawRow, SensorType, Tenant, ATTACHMENT_FIELD, DATETIME_FIELD,
    ORDER_ID_FIELD, SAMPLE_CODE_FIELD,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything one run hands from the Transformer to the Publisher.
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub sensor_types: Vec<SensorType>,
    pub import_checks: Vec<ImportCheck>,
    pub ingest_records: Vec<IngestRecord>,
    /// Order ids considered this run, whether or not ultimately ingested.
    pub touched: HashSet<String>,
}

/// Converts raw rows into deduplicated, tenant-scoped entities.
pub struct Transformer {
    config: SyncConfig,
    documents: Arc<dyn DocumentStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl Transformer {
    pub fn new(
        config: SyncConfig,
        documents: Arc<dyn DocumentStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            documents,
            metrics,
        }
    }

    /// Transform one run's raw rows.
    ///
    /// `already_done` is the ledger exclusion set; `now` anchors the
    /// recency window.
    pub async fn transform(
        &self,
        rows: Vec<RawRow>,
        already_done: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Result<TransformOutput> {
        let total = rows.len();
        let rows: Vec<RawRow> = rows
            .into_iter()
            .filter(|row| self.keep(row, already_done, now))
            .collect();
        debug!(total, kept = rows.len(), "filtered raw rows");

        // Partition by tenant so per-tenant dedup never collapses
        // entities across accounts.
        let mut partitions: BTreeMap<Tenant, Vec<RawRow>> = BTreeMap::new();
        for row in rows {
            let tenant = self.config.resolve_tenant(row.relation_id.as_deref());
            partitions.entry(tenant).or_default().push(row);
        }

        let mut output = TransformOutput::default();
        for (tenant, rows) in partitions {
            self.transform_partition(&tenant, &rows, &mut output).await;
        }
        Ok(output)
    }

    fn keep(&self, row: &RawRow, already_done: &HashSet<String>, now: DateTime<Utc>) -> bool {
        if row.result_points.is_empty() {
            debug!(order_id = %row.order_id, "dropping row without result points");
            self.metrics.incr(counters::ROWS_DROPPED);
            return false;
        }
        if already_done.contains(&row.order_id) {
            debug!(order_id = %row.order_id, "dropping already synced row");
            return false;
        }
        if !self.in_scope(row, now) {
            debug!(
                order_id = %row.order_id,
                package = %row.package_code,
                "dropping out-of-scope row"
            );
            self.metrics.incr(counters::ROWS_DROPPED);
            return false;
        }
        true
    }

    /// A row is in scope iff its package code is configured and its
    /// sample date falls within the recency window.
    fn in_scope(&self, row: &RawRow, now: DateTime<Utc>) -> bool {
        self.config.packages.contains_key(&row.package_code)
            && row.sample_date >= now - Duration::days(self.config.window_days)
    }

    async fn transform_partition(
        &self,
        tenant: &Tenant,
        rows: &[RawRow],
        output: &mut TransformOutput,
    ) {
        let mut sensor_types: BTreeMap<String, SensorType> = BTreeMap::new();
        let mut import_checks: BTreeMap<String, ImportCheck> = BTreeMap::new();

        for row in rows {
            output.touched.insert(row.order_id.clone());

            merge_widest(&mut sensor_types, self.sensor_type_for(tenant, row));

            let check = self.import_check_for(tenant, row);
            import_checks.entry(check.id.clone()).or_insert(check);
        }

        for row in rows {
            if let Some(record) = self.ingest_record_for(tenant, row).await {
                output.ingest_records.push(record);
            }
        }

        output.sensor_types.extend(sensor_types.into_values());
        output.import_checks.extend(import_checks.into_values());
    }

    fn package_name(&self, package_code: &str) -> String {
        // The scope filter only lets configured codes through; the
        // fallback keeps this total.
        self.config
            .packages
            .get(package_code)
            .cloned()
            .unwrap_or_else(|| package_code.to_string())
    }

    fn sensor_type_for(&self, tenant: &Tenant, row: &RawRow) -> SensorType {
        let mut schema = BTreeMap::new();
        schema.insert(
            ATTACHMENT_FIELD.to_string(),
            FieldSpec {
                label: "File".to_string(),
                field_type: FieldType::String,
                metric: self.config.metric_for(ATTACHMENT_FIELD),
            },
        );
        for point in &row.result_points {
            schema.insert(
                point.code.clone(),
                FieldSpec {
                    label: point.description.clone(),
                    field_type: infer_type(&point.value),
                    metric: self.config.metric_for(&point.code),
                },
            );
        }

        SensorType {
            id: sensor_type_id(&row.package_code, &self.config.schema_version),
            name: self.package_name(&row.package_code),
            tenant: tenant.clone(),
            schema,
        }
    }

    fn import_check_for(&self, tenant: &Tenant, row: &RawRow) -> ImportCheck {
        let sensor_type = sensor_type_id(&row.package_code, &self.config.schema_version);
        ImportCheck {
            id: import_check_id(row.object_code.as_deref(), &sensor_type),
            name: format!("{} Check", self.package_name(&row.package_code)),
            sensor_type_id: sensor_type,
            tenant: tenant.clone(),
        }
    }

    async fn ingest_record_for(&self, tenant: &Tenant, row: &RawRow) -> Option<IngestRecord> {
        let timestamp = truncate_to_seconds(row.sample_date);

        let mut data: BTreeMap<String, Value> = BTreeMap::new();
        for point in &row.result_points {
            data.insert(point.code.clone(), point.value.clone());
        }
        data.insert(
            DATETIME_FIELD.to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        data.insert(
            SAMPLE_CODE_FIELD.to_string(),
            Value::String(row.sample_code.clone()),
        );
        data.insert(
            ORDER_ID_FIELD.to_string(),
            Value::String(row.order_id.clone()),
        );

        let attachment = match self.documents.fetch(row).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    order_id = %row.order_id,
                    error = %e,
                    "no attachment, dropping ingest record"
                );
                self.metrics.incr(counters::ATTACHMENT_MISSING);
                return None;
            }
        };

        let sensor_type = sensor_type_id(&row.package_code, &self.config.schema_version);
        Some(IngestRecord {
            import_check_id: import_check_id(row.object_code.as_deref(), &sensor_type),
            order_id: row.order_id.clone(),
            tenant: tenant.clone(),
            data,
            attachment: Some(attachment),
            timestamp,
        })
    }
}

/// Keep the widest schema per sensor-type id: when two candidates share
/// an id, the one with more fields wins.
fn merge_widest(existing: &mut BTreeMap<String, SensorType>, candidate: SensorType) {
    match existing.get_mut(&candidate.id) {
        Some(current) if candidate.schema.len() > current.schema.len() => *current = candidate,
        Some(_) => {}
        None => {
            existing.insert(candidate.id.clone(), candidate);
        }
    }
}
