//! HTTP client for the telemetry service.

use crate::error::{Result, SyncError};
use crate::model::{ImportCheck, SensorType, Tenant};
use crate::telemetry::types::{
    CheckStats, ImportCheckPayload, ImportCheckResource, IngestEvent, IngestOutcome,
    SensorTypePayload, SensorTypeResource, UploadResource,
};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Telemetry API Constants
// ============================================================================

/// IANA timezone stamped on created import checks.
const CHECK_TIMEZONE: &str = "Europe/Amsterdam";

/// Notification relevance window (seconds) stamped on created import
/// checks.
const CHECK_NOTIFICATION_RELEVANCE: u32 = 300;

/// Per-tenant client for the telemetry API.
///
/// Every request carries the tenant's API key; organization-scoped
/// resources embed the tenant's organization in the path.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    client: Client,
    base_url: String,
    tenant: Tenant,
}

impl TelemetryClient {
    pub fn new(base_url: impl Into<String>, tenant: Tenant, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            tenant,
        })
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    fn org_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/organization/{}",
            self.base_url, resource, self.tenant.organization
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Authorization", &self.tenant.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("Authorization", &self.tenant.api_key)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    // ------------------------------------------------------------------
    // sensor-type
    // ------------------------------------------------------------------

    pub async fn list_sensor_types(&self) -> Result<Vec<SensorTypeResource>> {
        self.get_json(&self.org_url("sensor-type")).await
    }

    /// Existence lookup by natural key (`radioId`).
    pub async fn find_sensor_type(&self, radio_id: &str) -> Result<Option<SensorTypeResource>> {
        let types = self.list_sensor_types().await?;
        Ok(types.into_iter().find(|t| t.matches(radio_id)))
    }

    pub async fn create_sensor_type(
        &self,
        sensor_type: &SensorType,
    ) -> Result<SensorTypeResource> {
        let mut json_keys = Vec::with_capacity(sensor_type.schema.len());
        let mut json_labels = Vec::with_capacity(sensor_type.schema.len());
        let mut data_types = Vec::with_capacity(sensor_type.schema.len());
        let mut metrics = Vec::with_capacity(sensor_type.schema.len());
        for (code, spec) in &sensor_type.schema {
            json_keys.push(code.clone());
            json_labels.push(spec.label.clone());
            data_types.push(spec.field_type.as_str().to_string());
            metrics.push(spec.metric.clone());
        }

        let payload = SensorTypePayload {
            name: sensor_type.name.clone(),
            description: sensor_type.name.clone(),
            external: true,
            radio_id: sensor_type.id.clone(),
            json_keys,
            json_labels,
            data_types,
            metrics,
        };
        debug!(id = %sensor_type.id, organization = %self.tenant.organization, "creating sensor type");
        self.post_json(&self.org_url("sensor-type"), &payload).await
    }

    /// Grant another organization access to an owned sensor type.
    pub async fn share_sensor_type(&self, type_id: &str, organization: &str) -> Result<()> {
        let url = format!(
            "{}/share-sensor-type/sensor-type/{}/organization/{}",
            self.base_url, type_id, organization
        );
        debug!(type_id, organization, "sharing sensor type");
        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.tenant.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // import-check
    // ------------------------------------------------------------------

    pub async fn list_import_checks(&self) -> Result<Vec<ImportCheckResource>> {
        self.get_json(&self.org_url("import-check")).await
    }

    /// Existence lookup by natural key (`sourceId`).
    pub async fn find_import_check(&self, source_id: &str) -> Result<Option<ImportCheckResource>> {
        let checks = self.list_import_checks().await?;
        Ok(checks
            .into_iter()
            .find(|c| c.source_id.as_deref() == Some(source_id)))
    }

    pub async fn create_import_check(
        &self,
        check: &ImportCheck,
        sensor_type_id: &str,
    ) -> Result<ImportCheckResource> {
        let payload = ImportCheckPayload {
            name: check.name.clone(),
            description: check.name.clone(),
            sensor_type: sensor_type_id.to_string(),
            enabled: true,
            source_id: check.id.clone(),
            timezone: CHECK_TIMEZONE.to_string(),
            notification_relevance: CHECK_NOTIFICATION_RELEVANCE,
        };
        debug!(id = %check.id, organization = %self.tenant.organization, "creating import check");
        self.post_json(&self.org_url("import-check"), &payload)
            .await
    }

    // ------------------------------------------------------------------
    // ingest / data-upload / stats
    // ------------------------------------------------------------------

    pub async fn ingest(&self, events: &[IngestEvent]) -> Result<IngestOutcome> {
        self.post_json(&format!("{}/ingest", self.base_url), events)
            .await
    }

    /// Upload one attachment, returning the opaque handle to embed in the
    /// reading data.
    pub async fn upload_attachment(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResource> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/data-upload", self.base_url))
            .header("Authorization", &self.tenant.api_key)
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Recent samples for one check.
    pub async fn check_stats(&self, check_id: &str) -> Result<CheckStats> {
        self.get_json(&format!("{}/stats/check/{}", self.base_url, check_id))
            .await
    }
}
