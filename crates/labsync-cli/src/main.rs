//! Labsync - lab results to telemetry synchronization tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labsync_common::logging::{init_logging, LogConfig, LogLevel};
use labsync_core::config::{SourceConfig, SyncConfig};
use labsync_core::documents::HttpDocumentStore;
use labsync_core::ledger::Ledger;
use labsync_core::metrics::{MetricsSink, TracingMetrics};
use labsync_core::publish::Publisher;
use labsync_core::source::JsonFileSource;
use labsync_core::sync::Pipeline;
use labsync_core::transform::Transformer;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "labsync")]
#[command(author, version, about = "Synchronize lab analysis results into the telemetry platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one transform-and-publish pass
    Sync {
        /// Configuration file
        #[arg(short, long, env = "LABSYNC_CONFIG", default_value = "labsync.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    // The pipeline should still run if logging cannot be set up.
    let _ = init_logging(&log_config);

    if let Err(e) = execute(&cli).await {
        error!(error = %e, "command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Sync { config } => sync_once(config).await,
    }
}

async fn sync_once(config_path: &Path) -> Result<()> {
    let config = SyncConfig::load(config_path).with_context(|| {
        format!(
            "cannot load configuration from {}",
            config_path.display()
        )
    })?;

    let metrics: Arc<dyn MetricsSink> = Arc::new(TracingMetrics);
    let documents = Arc::new(HttpDocumentStore::new(&config.documents.base_url)?);
    let ledger = Ledger::new(&config.ledger_path);
    let publisher = Publisher::new(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
        config.default_tenant.clone(),
        Arc::clone(&metrics),
    );
    let transformer = Transformer::new(config.clone(), documents, Arc::clone(&metrics));

    let report = match &config.source {
        SourceConfig::Json { path } => {
            let source = JsonFileSource::new(path.clone());
            Pipeline::new(source, transformer, publisher, ledger)
                .run()
                .await?
        }
        #[cfg(feature = "database")]
        SourceConfig::Sql { url, table } => {
            let source = labsync_core::source::SqlSource::connect(url, table.clone()).await?;
            Pipeline::new(source, transformer, publisher, ledger)
                .run()
                .await?
        }
        #[cfg(not(feature = "database"))]
        SourceConfig::Sql { .. } => {
            anyhow::bail!("SQL sources require a build with the `database` feature")
        }
    };

    println!(
        "Synced: {} rows read, {} touched, {} confirmed, {} left for the next run",
        report.rows_read, report.rows_touched, report.confirmed, report.unconfirmed
    );
    Ok(())
}
