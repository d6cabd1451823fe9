//! Dependency-ordered publishing of the canonical model.
//!
//! Sensor types first, then import checks, then ingest records: later
//! entities reference earlier ones by remote-assigned id. Every
//! create/share/ingest call is caught at its own boundary; a failed
//! entity is logged, counted, and skipped for the rest of the run, and
//! its order ids simply never reach the ledger.

use crate::error::{Result, SyncError};
use crate::metrics::{counters, MetricsSink};
use crate::model::{ImportCheck, IngestRecord, SensorType, Tenant, ATTACHMENT_FIELD};
use crate::sync::TelemetrySink;
use crate::telemetry::{ImportCheckResource, IngestEvent, TelemetryClient};
use crate::transform::TransformOutput;
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Publishes one transformed bundle to the telemetry service.
///
/// Existence-check-then-create is not atomic against concurrent writers;
/// a single live pipeline instance is assumed.
pub struct Publisher {
    base_url: String,
    timeout: Duration,
    default_tenant: Tenant,
    /// Per-tenant clients, cached for the lifetime of the publisher.
    clients: HashMap<Tenant, TelemetryClient>,
    metrics: Arc<dyn MetricsSink>,
}

impl Publisher {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        default_tenant: Tenant,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            default_tenant,
            clients: HashMap::new(),
            metrics,
        }
    }

    fn client(&mut self, tenant: &Tenant) -> Result<TelemetryClient> {
        if let Some(client) = self.clients.get(tenant) {
            return Ok(client.clone());
        }
        let client = TelemetryClient::new(&self.base_url, tenant.clone(), self.timeout)?;
        self.clients.insert(tenant.clone(), client.clone());
        Ok(client)
    }

    /// Publish sensor types, import checks and ingest records, in that
    /// order, returning the order ids the service confirmed.
    pub async fn publish(&mut self, bundle: TransformOutput) -> Result<Vec<String>> {
        for sensor_type in &bundle.sensor_types {
            if let Err(e) = self.ensure_sensor_type(sensor_type).await {
                warn!(
                    id = %sensor_type.id,
                    organization = %sensor_type.tenant.organization,
                    error = %e,
                    "sensor type not available, dependents will be skipped"
                );
                self.metrics.incr(counters::SENSOR_TYPE_FAILED);
            }
        }

        for check in &bundle.import_checks {
            if let Err(e) = self.ensure_import_check(check).await {
                warn!(
                    id = %check.id,
                    organization = %check.tenant.organization,
                    error = %e,
                    "import check not available, its records will be skipped"
                );
                self.metrics.incr(counters::IMPORT_CHECK_FAILED);
            }
        }

        self.ingest_all(&bundle.ingest_records).await
    }

    /// Make a sensor type available to its tenant: reuse it, or create it
    /// under the default tenant and share it out.
    async fn ensure_sensor_type(&mut self, sensor_type: &SensorType) -> Result<()> {
        let client = self.client(&sensor_type.tenant)?;
        if client.find_sensor_type(&sensor_type.id).await?.is_some() {
            debug!(id = %sensor_type.id, "sensor type already present");
            return Ok(());
        }

        let default_tenant = self.default_tenant.clone();
        let owner = self.client(&default_tenant)?;
        let resource = match owner.find_sensor_type(&sensor_type.id).await? {
            Some(resource) => resource,
            None => {
                let created = owner.create_sensor_type(sensor_type).await?;
                self.metrics.incr(counters::SENSOR_TYPE_CREATED);
                created
            }
        };

        if sensor_type.tenant != default_tenant {
            owner
                .share_sensor_type(&resource.type_id, &sensor_type.tenant.organization)
                .await?;
            self.metrics.incr(counters::SENSOR_TYPE_SHARED);
        }
        Ok(())
    }

    /// Create an import check under its tenant, resolving the referenced
    /// sensor type under the default tenant.
    async fn ensure_import_check(&mut self, check: &ImportCheck) -> Result<()> {
        let client = self.client(&check.tenant)?;
        if client.find_import_check(&check.id).await?.is_some() {
            debug!(id = %check.id, "import check already present");
            return Ok(());
        }

        let default_tenant = self.default_tenant.clone();
        let owner = self.client(&default_tenant)?;
        let sensor_type = owner
            .find_sensor_type(&check.sensor_type_id)
            .await?
            .ok_or_else(|| SyncError::SensorTypeUnresolved(check.sensor_type_id.clone()))?;

        client
            .create_import_check(check, &sensor_type.type_id)
            .await?;
        self.metrics.incr(counters::IMPORT_CHECK_CREATED);
        Ok(())
    }

    async fn ingest_all(&mut self, records: &[IngestRecord]) -> Result<Vec<String>> {
        // Group per (tenant, check) so natural-key resolution and the
        // advisory cross-check happen once per channel.
        let mut groups: BTreeMap<(Tenant, String), Vec<&IngestRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry((record.tenant.clone(), record.import_check_id.clone()))
                .or_default()
                .push(record);
        }

        let mut confirmed = Vec::new();
        for ((tenant, check_id), group) in groups {
            let client = self.client(&tenant)?;
            let check = match client.find_import_check(&check_id).await {
                Ok(Some(check)) => check,
                Ok(None) => {
                    warn!(id = %check_id, "import check unresolved, skipping its records");
                    self.skip_group(group.len());
                    continue;
                }
                Err(e) => {
                    warn!(id = %check_id, error = %e, "import check lookup failed, skipping its records");
                    self.skip_group(group.len());
                    continue;
                }
            };

            let existing = self.existing_order_ids(&client, &check).await;

            for record in group {
                if existing.contains(record.order_id.as_str()) {
                    debug!(order_id = %record.order_id, "already present remotely, skipping");
                    self.metrics.incr(counters::INGEST_SKIPPED);
                    continue;
                }
                match self.ingest_one(&client, &check, record).await {
                    Ok(()) => {
                        self.metrics.incr(counters::INGEST_ACCEPTED);
                        confirmed.push(record.order_id.clone());
                    }
                    Err(e) => {
                        warn!(order_id = %record.order_id, error = %e, "ingest failed");
                        self.metrics.incr(counters::INGEST_FAILED);
                    }
                }
            }
        }
        Ok(confirmed)
    }

    fn skip_group(&self, len: usize) {
        for _ in 0..len {
            self.metrics.incr(counters::INGEST_SKIPPED);
        }
    }

    /// Advisory cross-check against the service's own recent history; a
    /// lookup failure only disables the extra filtering.
    async fn existing_order_ids(
        &self,
        client: &TelemetryClient,
        check: &ImportCheckResource,
    ) -> HashSet<String> {
        match client.check_stats(&check.check_id).await {
            Ok(stats) => stats.order_ids().map(str::to_string).collect(),
            Err(e) => {
                warn!(
                    check_id = %check.check_id,
                    error = %e,
                    "existing-sample cross-check unavailable, ingesting unfiltered"
                );
                HashSet::new()
            }
        }
    }

    /// Submit one record's batch, replacing the attachment with an upload
    /// handle first. Any failure here aborts only this batch.
    async fn ingest_one(
        &self,
        client: &TelemetryClient,
        check: &ImportCheckResource,
        record: &IngestRecord,
    ) -> Result<()> {
        let mut data = record.data.clone();
        if let Some(bytes) = &record.attachment {
            let upload = client
                .upload_attachment(&format!("{}.pdf", record.order_id), bytes.clone())
                .await?;
            data.insert(ATTACHMENT_FIELD.to_string(), Value::String(upload.upload_id));
        }

        let event = IngestEvent {
            check_id: check.check_id.clone(),
            data,
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: "ok".to_string(),
        };
        let outcome = client.ingest(std::slice::from_ref(&event)).await?;
        if outcome.failed_event_count > 0 {
            return Err(SyncError::IngestRejected {
                accepted: outcome.accepted_event_count,
                failed: outcome.failed_event_count,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for Publisher {
    async fn write(&mut self, bundle: TransformOutput) -> Result<Vec<String>> {
        self.publish(bundle).await
    }
}
