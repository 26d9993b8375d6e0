//! Table client: table management, entity CRUD and range queries.

use crate::client::TableProvider;
use crate::entity::{Entity, TableName};
use crate::error::{StorageError, ValidationError};
use crate::query::{
    ComparisonOperator, ContinuationMarker, EntityFilter, QueryPage, TableQuery, MAX_PAGE_SIZE,
};
use crate::validation::EntityValidator;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;

/// Client for one table storage account
///
/// Every write goes through the [`EntityValidator`] first; an entity that
/// fails validation never reaches the provider.
#[derive(Clone)]
pub struct TableClient {
    provider: Arc<dyn TableProvider>,
    validator: EntityValidator,
}

impl TableClient {
    /// Create a client over a provider
    pub fn new(provider: Arc<dyn TableProvider>, validator: EntityValidator) -> Self {
        Self {
            provider,
            validator,
        }
    }

    /// Validator applied before inserts and updates
    pub fn validator(&self) -> &EntityValidator {
        &self.validator
    }

    /// Check whether a table exists
    pub async fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        self.provider.table_exists(table).await
    }

    /// Create a table unless it already exists
    ///
    /// Returns `true` when the table was created by this call.
    pub async fn create_table(&self, table: &TableName) -> Result<bool, StorageError> {
        if self.provider.table_exists(table).await? {
            debug!(table = %table, "Table already exists");
            return Ok(false);
        }

        let created = self.provider.create_table(table).await?;
        if created {
            info!(table = %table, "Created table");
        }
        Ok(created)
    }

    /// Delete a table if it exists
    ///
    /// Returns `true` when the table was deleted by this call; deleting a
    /// table that does not exist is a no-op returning `false`.
    pub async fn delete_table(&self, table: &TableName) -> Result<bool, StorageError> {
        if !self.provider.table_exists(table).await? {
            debug!(table = %table, "Table does not exist, nothing to delete");
            return Ok(false);
        }

        let deleted = self.provider.delete_table(table).await?;
        if deleted {
            info!(table = %table, "Deleted table");
        }
        Ok(deleted)
    }

    /// Validate and insert an entity, returning its etag
    pub async fn insert_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        self.validator.validate(entity)?;
        entity.keys_required()?;

        let etag = self.provider.insert_entity(table, entity).await?;
        info!(table = %table, entity = %entity, "Entity inserted");
        Ok(etag)
    }

    /// Validate and replace an existing entity, returning its new etag
    ///
    /// The stored entity is replaced as a whole: properties missing from
    /// `entity` are removed. Fails with `EntityNotFound` when there is no
    /// entity with the same keys.
    pub async fn update_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        self.validator.validate(entity)?;
        entity.keys_required()?;

        let etag = self.provider.update_entity(table, entity).await?;
        info!(table = %table, entity = %entity, "Entity updated");
        Ok(etag)
    }

    /// Read an entity by its keys
    pub async fn get_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, StorageError> {
        let entity = self
            .provider
            .get_entity(table, partition_key, row_key)
            .await?;
        info!(table = %table, entity = %entity, "Entity read");
        Ok(entity)
    }

    /// Delete an entity by its keys
    pub async fn delete_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        self.provider
            .delete_entity(table, partition_key, row_key)
            .await?;
        info!(
            table = %table,
            partition_key = %partition_key,
            row_key = %row_key,
            "Entity deleted"
        );
        Ok(())
    }

    /// Query entities with `PartitionKey <operator> '<partition_key>'`
    ///
    /// Returns the first page at the service's default page size.
    pub async fn query(
        &self,
        table: &TableName,
        partition_key: &str,
        operator: ComparisonOperator,
    ) -> Result<QueryPage, StorageError> {
        info!(
            table = %table,
            partition_key = %partition_key,
            operator = %operator,
            "Querying table"
        );

        let query = TableQuery::new(EntityFilter::partition_key(operator, partition_key));
        self.provider.query_entities(table, &query).await
    }

    /// Query one page of entities in a partition with `min < RowKey < max`
    ///
    /// Returns at most `page_size` entities and the marker to pass back in
    /// for the next page, or `None` once the range is exhausted.
    pub async fn query_between_rowkey(
        &self,
        table: &TableName,
        partition_key: &str,
        min_rowkey: &str,
        max_rowkey: &str,
        page_size: u32,
        marker: Option<ContinuationMarker>,
    ) -> Result<QueryPage, StorageError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                message: format!("must be 1-{}", MAX_PAGE_SIZE),
            }
            .into());
        }

        info!(
            table = %table,
            partition_key = %partition_key,
            min_rowkey = %min_rowkey,
            max_rowkey = %max_rowkey,
            page_size,
            resuming = marker.is_some(),
            "Querying table row key range"
        );

        let query = TableQuery::new(EntityFilter::row_key_between(
            partition_key,
            min_rowkey,
            max_rowkey,
        ))
        .with_top(page_size)
        .with_marker(marker);

        self.provider.query_entities(table, &query).await
    }
}

impl std::fmt::Debug for TableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient")
            .field("provider", &self.provider.provider_name())
            .field("validator", &self.validator)
            .finish()
    }
}
