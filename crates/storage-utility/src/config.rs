//! Account credentials and client configuration.
//!
//! The account is read once at process start and handed to the client
//! factory. Nothing in this crate keeps process-wide client state.

use crate::validation::REQUIRED_FIELDS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Environment variable holding the storage account name
pub const ACCOUNT_NAME_VAR: &str = "AZURE_ACCOUNT_NAME";

/// Environment variable holding the storage account key
pub const ACCOUNT_KEY_VAR: &str = "AZURE_ACCOUNT_KEY";

/// Environment variable overriding the table service endpoint
pub const TABLE_ENDPOINT_VAR: &str = "AZURE_TABLE_ENDPOINT";

/// Environment variable overriding the queue service endpoint
pub const QUEUE_ENDPOINT_VAR: &str = "AZURE_QUEUE_ENDPOINT";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Immutable storage account credential pair
///
/// The key is base64 encoded, exactly as shown in the Azure portal. The
/// `Debug` output never contains the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccount {
    name: String,
    #[serde(skip_serializing)]
    key: String,
}

impl StorageAccount {
    /// Create a credential pair
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Load the credential pair from `AZURE_ACCOUNT_NAME` and `AZURE_ACCOUNT_KEY`
    ///
    /// Missing variables are not an error here. An account with an empty name
    /// or key is rejected by the service on the first request.
    pub fn from_env() -> Self {
        let name = std::env::var(ACCOUNT_NAME_VAR).unwrap_or_default();
        let key = std::env::var(ACCOUNT_KEY_VAR).unwrap_or_default();

        tracing::info!(account = %name, "Using storage account");

        Self { name, key }
    }

    /// Account name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base64 encoded account key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Configuration shared by the table and queue clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Account credentials
    pub account: StorageAccount,

    /// Table service endpoint; defaults to `https://{account}.table.core.windows.net`
    #[serde(default)]
    pub table_endpoint: Option<String>,

    /// Queue service endpoint; defaults to `https://{account}.queue.core.windows.net`
    #[serde(default)]
    pub queue_endpoint: Option<String>,

    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fields every entity must carry before it is written
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
}

impl StorageConfig {
    /// Create configuration for an account with default endpoints
    pub fn new(account: StorageAccount) -> Self {
        Self {
            account,
            table_endpoint: None,
            queue_endpoint: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            required_fields: default_required_fields(),
        }
    }

    /// Load configuration from the process environment
    ///
    /// Reads the account credentials plus the optional
    /// `AZURE_TABLE_ENDPOINT` and `AZURE_QUEUE_ENDPOINT` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::new(StorageAccount::from_env());
        config.table_endpoint = non_empty_var(TABLE_ENDPOINT_VAR);
        config.queue_endpoint = non_empty_var(QUEUE_ENDPOINT_VAR);
        config
    }

    /// Use a specific table endpoint, e.g. a local emulator
    pub fn with_table_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.table_endpoint = Some(endpoint.into());
        self
    }

    /// Use a specific queue endpoint, e.g. a local emulator
    pub fn with_queue_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.queue_endpoint = Some(endpoint.into());
        self
    }

    /// Resolved table service endpoint without trailing slash
    pub fn table_endpoint(&self) -> String {
        match &self.table_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.table.core.windows.net", self.account.name()),
        }
    }

    /// Resolved queue service endpoint without trailing slash
    pub fn queue_endpoint(&self) -> String {
        match &self.queue_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.queue.core.windows.net", self.account.name()),
        }
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_required_fields() -> Vec<String> {
    REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect()
}
