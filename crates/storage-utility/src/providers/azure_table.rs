//! Azure Table Storage provider using the table service REST API.
//!
//! Entities travel as JSON with minimal OData metadata. Every request is
//! signed with SharedKeyLite. Query pagination uses the
//! `x-ms-continuation-NextPartitionKey` and `x-ms-continuation-NextRowKey`
//! response headers, which are fed back as `NextPartitionKey` and
//! `NextRowKey` query parameters.
//!
//! ## Example
//!
//! ```no_run
//! use storage_utility::{AzureTableProvider, StorageAccount, StorageConfig, TableName};
//! use storage_utility::TableProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new(StorageAccount::new("myaccount", "a2V5"));
//! let provider = AzureTableProvider::new(&config)?;
//!
//! let table = TableName::new("sampletable")?;
//! let created = provider.create_table(&table).await?;
//! # Ok(())
//! # }
//! ```

use super::azure::{
    build_http_client, query_string, read_response, AzureStorageError, ServiceEndpoint,
    ServiceResponse,
};
use super::shared_key::{format_storage_date, SharedKeySigner, STORAGE_API_VERSION};
use crate::client::TableProvider;
use crate::config::StorageConfig;
use crate::entity::{Entity, TableName, TIMESTAMP};
use crate::error::{SerializationError, StorageError};
use crate::query::{quote_literal, ContinuationMarker, QueryPage, TableQuery};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client as HttpClient, Method};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "azure_table_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "AzureTable";

const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";

/// Suffix of the property annotation naming an EDM type
const ODATA_TYPE_SUFFIX: &str = "@odata.type";

const EDM_INT64: &str = "Edm.Int64";

/// Response header holding the partition to resume from
pub const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-NextPartitionKey";

/// Response header holding the row to resume from
pub const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-NextRowKey";

/// Azure Table Storage provider implementation
///
/// The provider is stateless apart from its HTTP connection pool and can be
/// shared across tasks behind an `Arc`.
pub struct AzureTableProvider {
    http_client: HttpClient,
    signer: SharedKeySigner,
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

impl AzureTableProvider {
    /// Create new Azure table provider
    ///
    /// # Errors
    ///
    /// Returns error if the account key is not base64, the endpoint is not
    /// a valid URL, or the HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self, AzureStorageError> {
        let signer = SharedKeySigner::new(&config.account)?;
        let endpoint = ServiceEndpoint::parse(&config.table_endpoint())?;
        let timeout = config.request_timeout();
        let http_client = build_http_client(timeout)?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
            timeout,
        })
    }

    /// Send a signed request to the table service
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        extra_headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ServiceResponse, AzureStorageError> {
        let date = format_storage_date(&Utc::now());
        let resource = self
            .signer
            .canonicalized_resource(&self.endpoint.resource_path(path), None);
        let authorization = self
            .signer
            .authorization(&SharedKeySigner::table_string_to_sign(&date, &resource));

        let mut url = self.endpoint.url(path);
        if !query.is_empty() {
            url = format!("{}?{}", url, query_string(query));
        }

        debug!(method = %method, url = %url, "Sending table request");

        let mut request = self
            .http_client
            .request(method, &url)
            .header("x-ms-date", date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("Accept", ACCEPT_JSON)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
            .header("Authorization", authorization);

        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        if let Some(body) = body {
            let body = serde_json::to_string(body).map_err(SerializationError::from)?;
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AzureStorageError::from_send_error(e, self.timeout))?;

        read_response(response, parse_error_message).await
    }

    /// Map errors of requests addressing a table
    fn table_error(table: &TableName, error: AzureStorageError) -> StorageError {
        match error.status() {
            Some(404) => StorageError::TableNotFound {
                table: table.to_string(),
            },
            _ => error.into_storage_error(),
        }
    }

    /// Map errors of requests addressing a single entity
    fn entity_error(
        table: &TableName,
        partition_key: &str,
        row_key: &str,
        error: AzureStorageError,
    ) -> StorageError {
        match (error.status(), error.code()) {
            (Some(404), Some("TableNotFound")) => StorageError::TableNotFound {
                table: table.to_string(),
            },
            (Some(404), _) => StorageError::EntityNotFound {
                table: table.to_string(),
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            },
            (Some(409), _) => StorageError::EntityAlreadyExists {
                table: table.to_string(),
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            },
            _ => error.into_storage_error(),
        }
    }
}

#[async_trait]
impl TableProvider for AzureTableProvider {
    async fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        match self
            .send(Method::GET, &table_path(table), &[], &[], None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn create_table(&self, table: &TableName) -> Result<bool, StorageError> {
        let body = serde_json::json!({ "TableName": table.as_str() });

        match self
            .send(
                Method::POST,
                "/Tables",
                &[],
                &[("Prefer", "return-no-content")],
                Some(&body),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Some("TableAlreadyExists") => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn delete_table(&self, table: &TableName) -> Result<bool, StorageError> {
        match self
            .send(Method::DELETE, &table_path(table), &[], &[], None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn insert_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        let (partition_key, row_key) = entity.keys_required()?;
        let body = entity_body(entity);

        let response = self
            .send(
                Method::POST,
                &format!("/{}", table),
                &[],
                &[("Prefer", "return-no-content")],
                Some(&body),
            )
            .await
            .map_err(|e| Self::entity_error(table, partition_key, row_key, e))?;

        response_etag(&response)
    }

    async fn update_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        let (partition_key, row_key) = entity.keys_required()?;
        let body = entity_body(entity);

        let response = self
            .send(
                Method::PUT,
                &entity_path(table, partition_key, row_key),
                &[],
                &[("If-Match", "*")],
                Some(&body),
            )
            .await
            .map_err(|e| Self::entity_error(table, partition_key, row_key, e))?;

        response_etag(&response)
    }

    async fn get_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, StorageError> {
        let response = self
            .send(
                Method::GET,
                &entity_path(table, partition_key, row_key),
                &[],
                &[],
                None,
            )
            .await
            .map_err(|e| Self::entity_error(table, partition_key, row_key, e))?;

        let value: Value = serde_json::from_str(&response.body).map_err(SerializationError::from)?;
        let mut entity = entity_from_json(value)?;
        if entity.etag().is_none() {
            entity.set_etag(response.header("ETag"));
        }
        Ok(entity)
    }

    async fn delete_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        self.send(
            Method::DELETE,
            &entity_path(table, partition_key, row_key),
            &[],
            &[("If-Match", "*")],
            None,
        )
        .await
        .map_err(|e| Self::entity_error(table, partition_key, row_key, e))?;

        Ok(())
    }

    async fn query_entities(
        &self,
        table: &TableName,
        query: &TableQuery,
    ) -> Result<QueryPage, StorageError> {
        let mut params = Vec::new();
        if let Some(filter) = &query.filter {
            params.push(("$filter", filter.to_odata()));
        }
        if let Some(top) = query.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(marker) = &query.marker {
            params.push(("NextPartitionKey", marker.next_partition_key().to_string()));
            if let Some(row_key) = marker.next_row_key() {
                params.push(("NextRowKey", row_key.to_string()));
            }
        }

        let response = self
            .send(Method::GET, &format!("/{}()", table), &params, &[], None)
            .await
            .map_err(|e| Self::table_error(table, e))?;

        parse_query_response(&response)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

impl std::fmt::Debug for AzureTableProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureTableProvider")
            .field("signer", &self.signer)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Paths and Payloads
// ============================================================================

fn table_path(table: &TableName) -> String {
    format!("/Tables('{}')", table)
}

/// Path addressing one entity, with both keys quoted and percent-encoded
fn entity_path(table: &TableName, partition_key: &str, row_key: &str) -> String {
    format!(
        "/{}(PartitionKey={},RowKey={})",
        table,
        urlencoding::encode(&quote_literal(partition_key)),
        urlencoding::encode(&quote_literal(row_key))
    )
}

/// Build an entity from a service payload, dropping OData annotations
fn entity_from_json(value: Value) -> Result<Entity, SerializationError> {
    let Value::Object(properties) = value else {
        return Err(SerializationError::NotAnObject);
    };

    let etag = properties
        .get("odata.etag")
        .and_then(Value::as_str)
        .map(str::to_string);

    let timestamp_type = format!("{}{}", TIMESTAMP, ODATA_TYPE_SUFFIX);
    let properties: Map<String, Value> = properties
        .into_iter()
        .filter(|(name, _)| {
            if name.starts_with("odata.") || *name == timestamp_type {
                return false;
            }
            match name.find("@odata.") {
                Some(_) => name.ends_with(ODATA_TYPE_SUFFIX),
                None => true,
            }
        })
        .collect();

    let mut entity = Entity::from_properties(properties);
    entity.set_etag(etag);
    Ok(entity)
}

/// JSON body of an entity write
///
/// Type annotations read from the service are sent back unchanged. Integers
/// outside the `Edm.Int32` range are written in the `Edm.Int64` string form.
fn entity_body(entity: &Entity) -> Value {
    let mut properties = entity.writable_properties();

    let wide: Vec<(String, i64)> = properties
        .iter()
        .filter_map(|(name, value)| {
            let number = value.as_i64()?;
            let annotated = properties.contains_key(&format!("{}{}", name, ODATA_TYPE_SUFFIX));
            (i32::try_from(number).is_err() && !annotated).then(|| (name.clone(), number))
        })
        .collect();

    for (name, number) in wide {
        properties.insert(
            format!("{}{}", name, ODATA_TYPE_SUFFIX),
            Value::String(EDM_INT64.to_string()),
        );
        properties.insert(name, Value::String(number.to_string()));
    }

    Value::Object(properties)
}

/// ETag header of a write response
fn response_etag(response: &ServiceResponse) -> Result<String, StorageError> {
    response
        .header("ETag")
        .filter(|etag| !etag.is_empty())
        .ok_or_else(|| {
            SerializationError::MissingElement {
                element: "ETag".to_string(),
            }
            .into()
        })
}

fn parse_query_response(response: &ServiceResponse) -> Result<QueryPage, StorageError> {
    let value: Value = serde_json::from_str(&response.body).map_err(SerializationError::from)?;

    let entities = match value.get("value") {
        Some(Value::Array(items)) => items
            .iter()
            .cloned()
            .map(entity_from_json)
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(SerializationError::MissingElement {
                element: "value".to_string(),
            }
            .into())
        }
    };

    let next_marker = response.header(NEXT_PARTITION_KEY_HEADER).map(|partition_key| {
        ContinuationMarker::new(partition_key, response.header(NEXT_ROW_KEY_HEADER))
    });

    debug!(
        count = entities.len(),
        has_more = next_marker.is_some(),
        "Received query page"
    );

    Ok(QueryPage::new(entities, next_marker))
}

/// Extract code and message from an OData JSON error body
fn parse_error_message(body: &str) -> Option<(Option<String>, String)> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("odata.error")?;

    let code = error
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .pointer("/message/value")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some((code, message))
}
