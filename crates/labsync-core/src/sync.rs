//! One-run orchestration: source -> transformer -> publisher -> ledger.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::model::RawRow;
use crate::transform::{TransformOutput, Transformer};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Produces the raw rows for one run.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn read_all(&self) -> Result<Vec<RawRow>>;
}

/// Persists a transformed bundle remotely, returning the order ids
/// confirmed written.
#[async_trait]
pub trait TelemetrySink: Send {
    async fn write(&mut self, bundle: TransformOutput) -> Result<Vec<String>>;
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub rows_read: usize,
    pub rows_touched: usize,
    pub confirmed: usize,
    /// Touched but not confirmed: retried on the next run.
    pub unconfirmed: usize,
}

/// Wires a row source, the transformer, a telemetry sink and the ledger
/// together for one run.
pub struct Pipeline<S, T> {
    source: S,
    transformer: Transformer,
    sink: T,
    ledger: Ledger,
}

impl<S: RowSource, T: TelemetrySink> Pipeline<S, T> {
    pub fn new(source: S, transformer: Transformer, sink: T, ledger: Ledger) -> Self {
        Self {
            source,
            transformer,
            sink,
            ledger,
        }
    }

    /// Run the pipeline once.
    ///
    /// Only order ids the sink confirms are appended to the ledger;
    /// touched-but-unconfirmed ids fall through to the next run. That
    /// asymmetry is what makes failed entities retry while successful
    /// ones never do.
    pub async fn run(&mut self) -> Result<SyncReport> {
        let already_done = self.ledger.load()?;
        info!(already_done = already_done.len(), "starting run");

        let rows = self.source.read_all().await?;
        let rows_read = rows.len();

        let bundle = self
            .transformer
            .transform(rows, &already_done, Utc::now())
            .await?;
        let rows_touched = bundle.touched.len();
        info!(
            sensor_types = bundle.sensor_types.len(),
            import_checks = bundle.import_checks.len(),
            ingest_records = bundle.ingest_records.len(),
            touched = rows_touched,
            "transformed"
        );

        let confirmed = self.sink.write(bundle).await?;
        self.ledger.append(&confirmed)?;

        let report = SyncReport {
            rows_read,
            rows_touched,
            confirmed: confirmed.len(),
            unconfirmed: rows_touched.saturating_sub(confirmed.len()),
        };
        info!(
            confirmed = report.confirmed,
            unconfirmed = report.unconfirmed,
            "run complete"
        );
        Ok(report)
    }
}
