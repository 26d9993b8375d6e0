//! Error types for table and queue operations.

use chrono::Duration;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Comprehensive error type for all storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Entity not found in table '{table}': PartitionKey='{partition_key}', RowKey='{row_key}'")]
    EntityNotFound {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("Entity already exists in table '{table}': PartitionKey='{partition_key}', RowKey='{row_key}'")]
    EntityAlreadyExists {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Pop receipt for message '{message_id}' is stale or invalid")]
    InvalidReceipt { message_id: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl StorageError {
    /// Check if error is transient and the operation could succeed if repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TableNotFound { .. } => false,
            Self::EntityNotFound { .. } => false,
            Self::EntityAlreadyExists { .. } => false,
            Self::QueueNotFound { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::InvalidReceipt { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::ProviderError { .. } => true,
            Self::Serialization(_) => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }

    /// Check if error reports that the addressed entity does not exist
    pub fn is_entity_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }
}

/// Errors during entity and message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing failed: {message}")]
    Xml { message: String },

    #[error("Response is missing element '{element}'")]
    MissingElement { element: String },

    #[error("Entity is not a JSON object")]
    NotAnObject,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Account key is not valid base64")]
    InvalidAccountKey,
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("One of the required fields is missing. Expected={expected} missing={missing}")]
    MissingFields { expected: FieldSet, missing: FieldSet },

    #[error("The required field {field} is not populated")]
    NotPopulated { field: String },

    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Unordered set of field names carried by [`ValidationError::MissingFields`].
///
/// Renders as the member names separated by single spaces. Callers should
/// compare sets, not rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    /// Check whether the set contains a field
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Number of fields in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the field names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(field)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
