//! In-memory table and queue provider for testing and development.
//!
//! This module provides a fully functional in-process backend that:
//! - Keeps tables ordered by (PartitionKey, RowKey) like the table service
//! - Assigns etags and `Timestamp` values on every write
//! - Pages query results with continuation markers
//! - Hides dequeued messages for a visibility timeout and checks pop receipts
//!
//! This provider is intended for:
//! - Unit testing of table and queue consumers
//! - Local development without a storage account
//! - Reference behaviour for the Azure providers

use crate::client::{QueueProvider, TableProvider};
use crate::entity::{Entity, TableName, TIMESTAMP};
use crate::error::StorageError;
use crate::message::{MessageId, PopReceipt, QueueMessage, QueueName};
use crate::query::{ContinuationMarker, QueryPage, TableQuery, MAX_PAGE_SIZE};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "InMemory";

// ============================================================================
// Configuration
// ============================================================================

/// In-memory provider configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Page size used when a query does not set one
    pub default_page_size: u32,
    /// How long a dequeued message stays invisible
    pub visibility_timeout: Duration,
    /// How long an enqueued message lives
    pub message_ttl: Duration,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: MAX_PAGE_SIZE,
            visibility_timeout: Duration::seconds(30),
            message_ttl: Duration::days(7),
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

type EntityKey = (String, String);

/// An entity as stored, with its server-assigned fields
#[derive(Clone)]
struct StoredEntity {
    properties: Map<String, Value>,
    etag: String,
    timestamp: DateTime<Utc>,
}

impl StoredEntity {
    fn to_entity(&self) -> Entity {
        let mut entity = Entity::from_properties(self.properties.clone()).with(
            TIMESTAMP,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        entity.set_etag(Some(self.etag.clone()));
        entity
    }
}

/// A message as stored in a queue
struct StoredMessage {
    id: MessageId,
    content: String,
    pop_receipt: PopReceipt,
    insertion_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    dequeue_count: u32,
}

impl StoredMessage {
    fn to_message(&self) -> QueueMessage {
        QueueMessage {
            id: self.id.clone(),
            content: self.content.clone(),
            pop_receipt: self.pop_receipt.clone(),
            insertion_time: Some(self.insertion_time),
            expiration_time: Some(self.expiration_time),
            time_next_visible: Some(self.visible_at),
            dequeue_count: self.dequeue_count,
        }
    }
}

/// All tables and queues of the in-memory account
#[derive(Default)]
struct StorageState {
    tables: HashMap<TableName, BTreeMap<EntityKey, StoredEntity>>,
    queues: HashMap<QueueName, VecDeque<StoredMessage>>,
    etag_sequence: u64,
}

impl StorageState {
    fn next_etag(&mut self) -> (String, DateTime<Utc>) {
        self.etag_sequence += 1;
        let now = Utc::now();
        let etag = format!(
            "W/\"datetime'{}'-{}\"",
            now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.etag_sequence
        );
        (etag, now)
    }

    fn table_mut(
        &mut self,
        table: &TableName,
    ) -> Result<&mut BTreeMap<EntityKey, StoredEntity>, StorageError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })
    }

    fn queue_mut(&mut self, queue: &QueueName) -> Result<&mut VecDeque<StoredMessage>, StorageError> {
        self.queues
            .get_mut(queue)
            .ok_or_else(|| StorageError::QueueNotFound {
                queue_name: queue.to_string(),
            })
    }
}

fn new_pop_receipt() -> PopReceipt {
    PopReceipt(uuid::Uuid::new_v4().simple().to_string())
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory table and queue provider implementation
#[derive(Clone)]
pub struct InMemoryProvider {
    state: Arc<RwLock<StorageState>>,
    config: InMemoryConfig,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StorageState::default())),
            config,
        }
    }

    /// Number of messages currently held by a queue, visible or not
    pub async fn queue_len(&self, queue: &QueueName) -> Option<usize> {
        let state = self.state.read().await;
        state.queues.get(queue).map(VecDeque::len)
    }

    /// Number of entities currently held by a table
    pub async fn table_len(&self, table: &TableName) -> Option<usize> {
        let state = self.state.read().await;
        state.tables.get(table).map(BTreeMap::len)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl TableProvider for InMemoryProvider {
    async fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        let state = self.state.read().await;
        Ok(state.tables.contains_key(table))
    }

    async fn create_table(&self, table: &TableName) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        if state.tables.contains_key(table) {
            return Ok(false);
        }
        state.tables.insert(table.clone(), BTreeMap::new());
        Ok(true)
    }

    async fn delete_table(&self, table: &TableName) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.tables.remove(table).is_some())
    }

    async fn insert_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        let (partition_key, row_key) = entity.keys_required()?;
        let key = (partition_key.to_string(), row_key.to_string());

        let mut state = self.state.write().await;
        let (etag, timestamp) = state.next_etag();
        let entities = state.table_mut(table)?;

        if entities.contains_key(&key) {
            return Err(StorageError::EntityAlreadyExists {
                table: table.to_string(),
                partition_key: key.0,
                row_key: key.1,
            });
        }

        entities.insert(
            key,
            StoredEntity {
                properties: entity.writable_properties(),
                etag: etag.clone(),
                timestamp,
            },
        );
        Ok(etag)
    }

    async fn update_entity(
        &self,
        table: &TableName,
        entity: &Entity,
    ) -> Result<String, StorageError> {
        let (partition_key, row_key) = entity.keys_required()?;
        let key = (partition_key.to_string(), row_key.to_string());

        let mut state = self.state.write().await;
        let (etag, timestamp) = state.next_etag();
        let entities = state.table_mut(table)?;

        match entities.get_mut(&key) {
            Some(stored) => {
                *stored = StoredEntity {
                    properties: entity.writable_properties(),
                    etag: etag.clone(),
                    timestamp,
                };
                Ok(etag)
            }
            None => Err(StorageError::EntityNotFound {
                table: table.to_string(),
                partition_key: key.0,
                row_key: key.1,
            }),
        }
    }

    async fn get_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, StorageError> {
        let state = self.state.read().await;
        let entities = state
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })?;

        entities
            .get(&(partition_key.to_string(), row_key.to_string()))
            .map(StoredEntity::to_entity)
            .ok_or_else(|| StorageError::EntityNotFound {
                table: table.to_string(),
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            })
    }

    async fn delete_entity(
        &self,
        table: &TableName,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let entities = state.table_mut(table)?;

        entities
            .remove(&(partition_key.to_string(), row_key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::EntityNotFound {
                table: table.to_string(),
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            })
    }

    async fn query_entities(
        &self,
        table: &TableName,
        query: &TableQuery,
    ) -> Result<QueryPage, StorageError> {
        let state = self.state.read().await;
        let entities = state
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })?;

        let start = match &query.marker {
            Some(marker) => Bound::Included((
                marker.next_partition_key().to_string(),
                marker.next_row_key().unwrap_or_default().to_string(),
            )),
            None => Bound::Unbounded,
        };
        let page_size = query
            .top
            .unwrap_or(self.config.default_page_size)
            .min(MAX_PAGE_SIZE) as usize;

        let mut matching = entities
            .range((start, Bound::Unbounded))
            .map(|(key, stored)| (key, stored.to_entity()))
            .filter(|(_, entity)| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(entity))
            });

        let page: Vec<Entity> = matching
            .by_ref()
            .take(page_size)
            .map(|(_, entity)| entity)
            .collect();
        let next_marker = matching
            .next()
            .map(|((pk, rk), _)| ContinuationMarker::new(pk.clone(), Some(rk.clone())));

        Ok(QueryPage::new(page, next_marker))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, StorageError> {
        let state = self.state.read().await;
        Ok(state.queues.contains_key(queue))
    }

    async fn create_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        if state.queues.contains_key(queue) {
            return Ok(false);
        }
        state.queues.insert(queue.clone(), VecDeque::new());
        Ok(true)
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.queues.remove(queue).is_some())
    }

    async fn put_message(
        &self,
        queue: &QueueName,
        content: &str,
    ) -> Result<QueueMessage, StorageError> {
        let mut state = self.state.write().await;
        let messages = state.queue_mut(queue)?;

        let now = Utc::now();
        let stored = StoredMessage {
            id: MessageId(uuid::Uuid::new_v4().to_string()),
            content: content.to_string(),
            pop_receipt: new_pop_receipt(),
            insertion_time: now,
            expiration_time: now + self.config.message_ttl,
            visible_at: now,
            dequeue_count: 0,
        };
        let message = stored.to_message();
        messages.push_back(stored);
        Ok(message)
    }

    async fn get_messages(
        &self,
        queue: &QueueName,
        num_messages: u32,
    ) -> Result<Vec<QueueMessage>, StorageError> {
        let mut state = self.state.write().await;
        let messages = state.queue_mut(queue)?;

        let now = Utc::now();
        messages.retain(|m| m.expiration_time > now);

        let visible_until = now + self.config.visibility_timeout;
        let received = messages
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .take(num_messages as usize)
            .map(|m| {
                m.pop_receipt = new_pop_receipt();
                m.visible_at = visible_until;
                m.dequeue_count += 1;
                m.to_message()
            })
            .collect();

        Ok(received)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let messages = state.queue_mut(queue)?;

        let position = messages
            .iter()
            .position(|m| &m.id == message_id)
            .ok_or_else(|| StorageError::MessageNotFound {
                message_id: message_id.to_string(),
            })?;

        if &messages[position].pop_receipt != pop_receipt {
            return Err(StorageError::InvalidReceipt {
                message_id: message_id.to_string(),
            });
        }

        messages.remove(position);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
