//! Provider traits and the client factory.
//!
//! A provider is a concrete backend (Azure REST or in-memory). The table and
//! queue clients wrap a provider and add validation and logging on top of it.

use crate::config::StorageConfig;
use crate::entity::{Entity, TableName};
use crate::error::StorageError;
use crate::message::{MessageId, PopReceipt, QueueMessage, QueueName};
use crate::providers::{AzureQueueProvider, AzureTableProvider, InMemoryProvider};
use crate::query::{QueryPage, TableQuery};
use crate::queue::QueueClient;
use crate::table::TableClient;
use crate::validation::EntityValidator;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by table storage backends
#[async_trait]
pub trait TableProvider: Send + Sync {
    /// Check whether a table exists
    async fn table_exists(&self, table: &TableName) -> Result<bool, StorageError>;

    /// Create a table; `false` when it already existed
    async fn create_table(&self, table: &TableName) -> Result<bool, StorageError>;

    /// Delete a table; `false` when it did not exist
    async fn delete_table(&self, table: &TableName) -> Result<bool, StorageError>;

    /// Insert a new entity and return its etag
    async fn insert_entity(&self, table: &TableName, entity: &Entity)
        -> Result<String, StorageError>;

    /// Replace an existing entity unconditionally and return its new etag
    async fn update_entity(&self, table: &TableName, entity: &Entity)
        -> Result<String, StorageError>;

    /// Read a single entity
    async fn get_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, StorageError>;

    /// Delete a single entity unconditionally
    async fn delete_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError>;

    /// Execute one page of a query
    async fn query_entities(
        &self,
        table: &TableName,
        query: &TableQuery,
    ) -> Result<QueryPage, StorageError>;

    /// Short backend name for logs and errors
    fn provider_name(&self) -> &'static str;
}

/// Interface implemented by queue storage backends
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Check whether a queue exists
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, StorageError>;

    /// Create a queue; `false` when it already existed
    async fn create_queue(&self, queue: &QueueName) -> Result<bool, StorageError>;

    /// Delete a queue; `false` when it did not exist
    async fn delete_queue(&self, queue: &QueueName) -> Result<bool, StorageError>;

    /// Enqueue a message
    async fn put_message(
        &self,
        queue: &QueueName,
        content: &str,
    ) -> Result<QueueMessage, StorageError>;

    /// Dequeue up to `num_messages` visible messages
    async fn get_messages(
        &self,
        queue: &QueueName,
        num_messages: u32,
    ) -> Result<Vec<QueueMessage>, StorageError>;

    /// Delete a dequeued message
    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), StorageError>;

    /// Short backend name for logs and errors
    fn provider_name(&self) -> &'static str;
}

/// Factory for creating storage clients with appropriate providers
pub struct StorageClientFactory;

impl StorageClientFactory {
    /// Create a table client backed by Azure Table Storage
    pub fn create_table_client(config: &StorageConfig) -> Result<TableClient, StorageError> {
        let provider = AzureTableProvider::new(config).map_err(|e| e.into_storage_error())?;
        Ok(TableClient::new(
            Arc::new(provider),
            EntityValidator::new(config.required_fields.iter().cloned()),
        ))
    }

    /// Create a queue client backed by Azure Queue Storage
    pub fn create_queue_client(config: &StorageConfig) -> Result<QueueClient, StorageError> {
        let provider = AzureQueueProvider::new(config).map_err(|e| e.into_storage_error())?;
        Ok(QueueClient::new(Arc::new(provider)))
    }

    /// Create table and queue clients sharing one in-memory backend
    pub fn create_in_memory_clients() -> (TableClient, QueueClient) {
        let provider = Arc::new(InMemoryProvider::default());
        let table = TableClient::new(provider.clone(), EntityValidator::default());
        let queue = QueueClient::new(provider);
        (table, queue)
    }
}
