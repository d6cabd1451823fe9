//! SQL row source: one-table scan over the source-of-record.

use crate::error::{Result, SyncError};
use crate::model::{RawRow, ResultPoint};
use crate::sync::RowSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

/// Reads raw rows from a relational table.
///
/// Result points are expected in a JSON text column, matching the layout
/// of the lab's export table.
pub struct SqlSource {
    pool: PgPool,
    table: String,
}

impl SqlSource {
    pub async fn connect(url: &str, table: impl Into<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| SyncError::source(format!("cannot connect to source: {e}")))?;
        Ok(Self {
            pool,
            table: table.into(),
        })
    }
}

fn column_error(e: sqlx::Error) -> SyncError {
    SyncError::source(format!("unexpected source row shape: {e}"))
}

#[async_trait]
impl RowSource for SqlSource {
    async fn read_all(&self) -> Result<Vec<RawRow>> {
        let query = format!(
            "SELECT order_id, sample_id, sample_code, package_code, sample_date, \
             relation_id, object_code, resource_id, result_points FROM {}",
            self.table
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SyncError::source(format!("source query failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let points_json: String = row.try_get("result_points").map_err(column_error)?;
            let result_points: Vec<ResultPoint> = serde_json::from_str(&points_json)?;
            let sample_date: DateTime<Utc> =
                row.try_get("sample_date").map_err(column_error)?;

            out.push(RawRow {
                order_id: row.try_get("order_id").map_err(column_error)?,
                sample_id: row.try_get("sample_id").map_err(column_error)?,
                sample_code: row.try_get("sample_code").map_err(column_error)?,
                package_code: row.try_get("package_code").map_err(column_error)?,
                sample_date,
                relation_id: row.try_get("relation_id").map_err(column_error)?,
                object_code: row.try_get("object_code").map_err(column_error)?,
                resource_id: row.try_get("resource_id").map_err(column_error)?,
                result_points,
            });
        }
        info!(count = out.len(), table = %self.table, "read raw rows");
        Ok(out)
    }
}
