//! Common test utilities for storage-utility integration tests
//!
//! This module provides:
//! - Clients over a shared in-memory backend
//! - A provider wrapper that counts the calls reaching the backend
//! - Entity builders that satisfy the default required fields

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage_utility::{
    Entity, EntityValidator, InMemoryProvider, QueryPage, StorageError, TableClient, TableName,
    TableProvider, TableQuery, REQUIRED_FIELDS,
};

pub const PARTITION: &str = "partitionvalue";

#[allow(dead_code)]
pub fn sample_table() -> TableName {
    TableName::new("sampletable").expect("valid table name")
}

/// Entity with keys and every default required field populated
#[allow(dead_code)]
pub fn complete_entity(row_key: &str) -> Entity {
    REQUIRED_FIELDS
        .iter()
        .fold(Entity::new(PARTITION, row_key), |entity, field| {
            entity.with(*field, format!("{}-{}", field, row_key))
        })
        .with("ID", row_key)
}

// ============================================================================
// Counting Provider
// ============================================================================

/// Table provider that forwards to memory and counts every call
#[derive(Default)]
pub struct CountingProvider {
    inner: InMemoryProvider,
    writes: AtomicUsize,
    queries: AtomicUsize,
    reads: AtomicUsize,
}

#[allow(dead_code)]
impl CountingProvider {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableProvider for CountingProvider {
    async fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        self.inner.table_exists(table).await
    }

    async fn create_table(&self, table: &TableName) -> Result<bool, StorageError> {
        self.inner.create_table(table).await
    }

    async fn delete_table(&self, table: &TableName) -> Result<bool, StorageError> {
        self.inner.delete_table(table).await
    }

    async fn insert_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_entity(table, entity).await
    }

    async fn update_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_entity(table, entity).await
    }

    async fn get_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_entity(table, partition_key, row_key).await
    }

    async fn delete_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        self.inner.delete_entity(table, partition_key, row_key).await
    }

    async fn query_entities(
        &self,
        table: &TableName,
        query: &TableQuery,
    ) -> Result<QueryPage, StorageError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_entities(table, query).await
    }

    fn provider_name(&self) -> &'static str {
        "Counting"
    }
}

/// Table client with the default validator over a counting provider, with
/// the sample table created
#[allow(dead_code)]
pub async fn counting_client() -> (TableClient, Arc<CountingProvider>) {
    let provider = Arc::new(CountingProvider::default());
    let client = TableClient::new(provider.clone(), EntityValidator::default());
    client
        .create_table(&sample_table())
        .await
        .expect("create sample table");
    (client, provider)
}
