//! # Table Loop
//!
//! Binary entry point of the scheduled table loop job.
//!
//! This executable:
//! - Initializes logging
//! - Loads the job configuration and the storage account from the environment
//! - Walks the configured row-key range once and exits
//!
//! Exit code 0 means every page was processed.

use anyhow::Context;
use storage_utility::{StorageClientFactory, StorageConfig};
use table_loop::LoopConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_loop=info,storage_utility=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting table loop");

    let loop_config = LoopConfig::load().context("loading table loop configuration")?;
    let storage_config = StorageConfig::from_env();
    let client = StorageClientFactory::create_table_client(&storage_config)
        .context("creating table client")?;

    match table_loop::run(&loop_config, client).await {
        Ok(summary) => {
            info!(
                pages = summary.pages,
                entities_seen = summary.entities_seen,
                processed = summary.processed,
                skipped = summary.skipped,
                "Table loop finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, table = %loop_config.table, "Table loop failed");
            Err(e.into())
        }
    }
}
