//! Document-retrieval boundary.
//!
//! The lab's resource service supplies one binary report document per
//! row. The pipeline depends only on the [`DocumentStore`] trait; the
//! HTTP implementation here is the production adapter.

use crate::model::RawRow;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Resource type the lab service uses for analysis report documents.
const REPORT_RESOURCE_TYPE: u32 = 3;

/// Default HTTP timeout for document requests, in seconds.
const DOCUMENT_TIMEOUT_SECS: u64 = 30;

/// Document-retrieval errors.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The service has no document for this row
    #[error("no document for order {0}")]
    NotFound(String),

    /// The row carries no resource reference to look up
    #[error("row {0} has no resource id")]
    MissingResourceId(String),

    #[error("document request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document service returned status {0}")]
    Status(u16),
}

/// Supplies the binary attachment for a row.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the attachment bytes for one row.
    async fn fetch(&self, row: &RawRow) -> Result<Vec<u8>, DocumentError>;
}

/// HTTP adapter for the lab's document service.
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DocumentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOCUMENT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, row: &RawRow) -> Result<Vec<u8>, DocumentError> {
        let resource_id = row
            .resource_id
            .as_deref()
            .ok_or_else(|| DocumentError::MissingResourceId(row.order_id.clone()))?;

        let url = format!("{}/resource", self.base_url);
        let body = serde_json::json!({
            "relationId": row.relation_id,
            "resourceId": resource_id,
            "resourceTypeId": REPORT_RESOURCE_TYPE,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DocumentError::NotFound(row.order_id.clone())),
            status if !status.is_success() => Err(DocumentError::Status(status.as_u16())),
            _ => Ok(response.bytes().await?.to_vec()),
        }
    }
}
