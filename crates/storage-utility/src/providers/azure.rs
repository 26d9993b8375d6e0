//! HTTP plumbing shared by the Azure table and queue providers.
//!
//! Both providers talk to the storage REST API directly with `reqwest` and
//! sign every request with [`SharedKeySigner`](super::shared_key::SharedKeySigner).
//! Going through plain HTTP keeps the providers testable against a mock
//! server and works unchanged against the Azurite emulator.

use crate::error::{ConfigurationError, SerializationError, StorageError};
use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, StatusCode};
use std::time::Duration;
use url::Url;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

/// Header carrying the service's error code
pub(crate) const ERROR_CODE_HEADER: &str = "x-ms-error-code";

// ============================================================================
// Error Types
// ============================================================================

/// Azure Storage REST specific errors
#[derive(Debug, thiserror::Error)]
pub enum AzureStorageError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage service error {status}: {code} - {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl AzureStorageError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::NetworkError(_) => true,
            Self::Timeout(_) => true,
            Self::ServiceError { status, .. } => *status >= 500 || *status == 429,
            Self::Configuration(_) => false,
            Self::Serialization(_) => false,
        }
    }

    /// HTTP status of a service error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServiceError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Service error code, such as `TableNotFound`
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ServiceError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Map Azure error to StorageError
    ///
    /// Resource specific codes (missing table, missing message and so on)
    /// are mapped by the providers, which know the resource involved.
    pub fn into_storage_error(self) -> StorageError {
        match self {
            Self::Authentication(message) => StorageError::AuthenticationFailed { message },
            Self::NetworkError(message) => StorageError::ConnectionFailed { message },
            Self::Timeout(duration) => StorageError::Timeout {
                duration: chrono::Duration::milliseconds(duration.as_millis() as i64),
            },
            Self::ServiceError {
                status: 401 | 403,
                code,
                message,
            } => StorageError::AuthenticationFailed {
                message: format!("{}: {}", code, message),
            },
            Self::ServiceError { code, message, .. } => StorageError::ProviderError {
                provider: "Azure".to_string(),
                code,
                message,
            },
            Self::Configuration(e) => StorageError::Configuration(e),
            Self::Serialization(e) => StorageError::Serialization(e),
        }
    }

    /// Classify a `reqwest` send failure
    pub(crate) fn from_send_error(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_connect() {
            Self::NetworkError(format!("Connection failed: {}", error))
        } else {
            Self::NetworkError(format!("HTTP request failed: {}", error))
        }
    }
}

// ============================================================================
// Endpoint Handling
// ============================================================================

/// Parsed service endpoint
///
/// Emulator endpoints carry the account in the path
/// (`http://127.0.0.1:10002/devstoreaccount1`); that prefix has to be part
/// of the signed resource as well as of the request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceEndpoint {
    base: String,
    path_prefix: String,
}

impl ServiceEndpoint {
    pub(crate) fn parse(endpoint: &str) -> Result<Self, ConfigurationError> {
        let url = Url::parse(endpoint).map_err(|e| ConfigurationError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigurationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "scheme must be http or https".to_string(),
            });
        }

        Ok(Self {
            base: endpoint.trim_end_matches('/').to_string(),
            path_prefix: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Full request URL for a resource path
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Resource path as it appears on the wire, emulator prefix included
    pub(crate) fn resource_path(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }
}

// ============================================================================
// HTTP Helpers
// ============================================================================

/// Response of a successful request
#[derive(Debug)]
pub(crate) struct ServiceResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ServiceResponse {
    pub(crate) fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

/// Create the HTTP client used by a provider
pub(crate) fn build_http_client(timeout: Duration) -> Result<HttpClient, AzureStorageError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AzureStorageError::NetworkError(format!("Failed to create HTTP client: {}", e)))
}

/// Build a query string from already ordered parameters
pub(crate) fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Read the response and turn non-success statuses into errors
///
/// `parse_message` extracts the human readable message from an error body;
/// the table service answers in JSON and the queue service in XML.
pub(crate) async fn read_response(
    response: reqwest::Response,
    parse_message: fn(&str) -> Option<(Option<String>, String)>,
) -> Result<ServiceResponse, AzureStorageError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| AzureStorageError::NetworkError(format!("Failed to read response body: {}", e)))?;

    if status.is_success() {
        return Ok(ServiceResponse {
            status,
            headers,
            body,
        });
    }

    let (body_code, message) = parse_message(&body).unwrap_or((None, body.clone()));
    let code = headers
        .get(ERROR_CODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(body_code)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    Err(AzureStorageError::ServiceError {
        status: status.as_u16(),
        code,
        message,
    })
}
