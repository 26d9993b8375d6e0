//! # Table Loop
//!
//! Configuration and entry point of the `table-loop` batch job, which walks
//! a row-key range of one table partition and re-reads every entity it finds.
//!
//! Configuration sources, applied in order (later sources override earlier ones):
//!  1. `./config/table-loop.yaml`            - deployment-local defaults
//!  2. Path given by `TABLE_LOOP_CONFIG_FILE` - operator-specified file
//!  3. Environment variables prefixed `TABLE_LOOP__` (double-underscore separator),
//!     e.g. `TABLE_LOOP__PAGE_SIZE=50` sets `page_size = 50`
//!
//! Every field carries a serde default, so an unconfigured environment
//! produces a valid configuration.

use serde::{Deserialize, Serialize};
use storage_utility::{
    PollingDriver, RangeScan, ScanSummary, StorageError, TableClient, TableName, ValidationError,
};
use storage_utility::query::MAX_PAGE_SIZE;
use tracing::info;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_VAR: &str = "TABLE_LOOP_CONFIG_FILE";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "TABLE_LOOP";

const LOCAL_CONFIG_FILE: &str = "config/table-loop";

/// Errors raised while loading the job configuration
#[derive(Debug, thiserror::Error)]
pub enum LoopConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// Settings of one table loop run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Exclusive lower row-key bound
    #[serde(default)]
    pub min_row_key: String,

    /// Exclusive upper row-key bound
    #[serde(default = "default_max_row_key")]
    pub max_row_key: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Property holding the row key used to re-read each entity
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            partition_key: default_partition_key(),
            min_row_key: String::new(),
            max_row_key: default_max_row_key(),
            page_size: default_page_size(),
            id_field: default_id_field(),
        }
    }
}

impl LoopConfig {
    /// Load configuration from the local file, the explicit file and the environment
    pub fn load() -> Result<Self, LoopConfigError> {
        let explicit_file = std::env::var(CONFIG_FILE_VAR)
            .ok()
            .filter(|path| !path.is_empty());
        Self::load_from(explicit_file.as_deref())
    }

    /// Load configuration with an optional explicit file
    ///
    /// The explicit file must exist when given; the local file is optional.
    pub fn load_from(explicit_file: Option<&str>) -> Result<Self, LoopConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name(LOCAL_CONFIG_FILE)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        if let Some(path) = explicit_file {
            info!(path = %path, "Loading configuration from explicit path");
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let loop_config: Self = config.try_deserialize()?;
        loop_config.range_scan()?;
        Ok(loop_config)
    }

    /// The scan described by this configuration
    pub fn range_scan(&self) -> Result<RangeScan, ValidationError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                message: format!("must be 1-{}", MAX_PAGE_SIZE),
            });
        }

        Ok(RangeScan::new(
            TableName::new(self.table.as_str())?,
            self.partition_key.as_str(),
            self.min_row_key.as_str(),
            self.max_row_key.as_str(),
        )
        .with_page_size(self.page_size)
        .with_id_field(self.id_field.as_str()))
    }
}

fn default_table() -> String {
    "sampletable".to_string()
}

fn default_partition_key() -> String {
    "partitionvalue".to_string()
}

fn default_max_row_key() -> String {
    "~".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_id_field() -> String {
    "ID".to_string()
}

/// Walk the configured range once
pub async fn run(config: &LoopConfig, client: TableClient) -> Result<ScanSummary, StorageError> {
    let scan = config.range_scan()?;
    let driver = PollingDriver::new(client);

    info!(table = %scan.table, "Sample Table - starting loop");
    driver.run(&scan).await
}
