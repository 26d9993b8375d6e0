//! SharedKeyLite request signing for the table and queue services.
//!
//! Both services accept the "Lite" variant of shared key authorization. The
//! string to sign differs per service:
//!
//! - **Table**: `x-ms-date` value, newline, canonicalized resource
//! - **Queue**: verb, Content-MD5, Content-Type and Date lines, the sorted
//!   `x-ms-*` headers, then the canonicalized resource
//!
//! The signature is `base64(HMAC-SHA256(base64_decode(account_key), string_to_sign))`
//! and is sent as `Authorization: SharedKeyLite <account>:<signature>`.

use crate::config::{StorageAccount, ACCOUNT_NAME_VAR};
use crate::error::ConfigurationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

#[cfg(test)]
#[path = "shared_key_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date format expected in `x-ms-date`
pub const STORAGE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Service version sent with every request
pub const STORAGE_API_VERSION: &str = "2019-02-02";

/// Format a timestamp for the `x-ms-date` header
pub fn format_storage_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(STORAGE_DATE_FORMAT).to_string()
}

/// Signs requests with a storage account key
#[derive(Clone)]
pub struct SharedKeySigner {
    account: String,
    mac: HmacSha256,
}

impl SharedKeySigner {
    /// Create a signer for an account
    ///
    /// # Errors
    ///
    /// Returns error if the account name is empty or the key is not base64.
    pub fn new(account: &StorageAccount) -> Result<Self, ConfigurationError> {
        if account.name().is_empty() {
            return Err(ConfigurationError::Missing {
                key: ACCOUNT_NAME_VAR.to_string(),
            });
        }

        let key = BASE64
            .decode(account.key())
            .map_err(|_| ConfigurationError::InvalidAccountKey)?;
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|_| ConfigurationError::InvalidAccountKey)?;

        Ok(Self {
            account: account.name().to_string(),
            mac,
        })
    }

    /// Name of the account requests are signed for
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Build the canonicalized resource for a request path
    ///
    /// `path` is the URL path as sent, starting with `/`. The only query
    /// parameter that takes part in SharedKeyLite signing is `comp`.
    pub fn canonicalized_resource(&self, path: &str, comp: Option<&str>) -> String {
        match comp {
            Some(comp) => format!("/{}{}?comp={}", self.account, path, comp),
            None => format!("/{}{}", self.account, path),
        }
    }

    /// Build the table service string to sign
    pub fn table_string_to_sign(date: &str, canonicalized_resource: &str) -> String {
        format!("{}\n{}", date, canonicalized_resource)
    }

    /// Build the queue service string to sign
    ///
    /// `ms_headers` are the `x-ms-*` headers of the request in any order.
    pub fn queue_string_to_sign(
        method: &str,
        content_type: &str,
        ms_headers: &[(&str, &str)],
        canonicalized_resource: &str,
    ) -> String {
        let mut headers: Vec<(String, &str)> = ms_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonicalized_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();

        // Content-MD5 and Date are always empty; x-ms-date carries the date
        format!(
            "{}\n\n{}\n\n{}{}",
            method, content_type, canonicalized_headers, canonicalized_resource
        )
    }

    /// Compute the base64 signature of a string to sign
    pub fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Build the `Authorization` header value for a string to sign
    pub fn authorization(&self, string_to_sign: &str) -> String {
        format!("SharedKeyLite {}:{}", self.account, self.sign(string_to_sign))
    }
}

impl fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}
