//! # Storage Utility
//!
//! Thin wrappers around Azure Table Storage and Azure Queue Storage.
//!
//! This library provides:
//! - Table and entity CRUD with required-field validation before every write
//! - Partition scoped row-key range queries with page limits and continuation markers
//! - A polling driver that walks a row-key range page by page
//! - Queue creation, enqueue, lazy dequeue and delete-by-receipt
//! - Azure REST and in-memory backends behind a provider seam
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all storage operations
//! - [`config`] - Account credentials and client configuration
//! - [`entity`] - Entities and table names
//! - [`validation`] - Required-field validation
//! - [`query`] - Filter construction, query pages and continuation markers
//! - [`message`] - Queue names and queue messages
//! - [`client`] - Provider traits and the client factory
//! - [`table`] - Table client
//! - [`queue`] - Queue client
//! - [`polling`] - Paginated range scan driver
//! - [`providers`] - Backend implementations

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod message;
pub mod polling;
pub mod providers;
pub mod query;
pub mod queue;
pub mod table;
pub mod validation;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueProvider, StorageClientFactory, TableProvider};
pub use config::{StorageAccount, StorageConfig};
pub use entity::{Entity, TableName};
pub use error::{ConfigurationError, SerializationError, StorageError, ValidationError};
pub use message::{MessageId, PopReceipt, QueueMessage, QueueName};
pub use polling::{EntityHandler, LoggingHandler, PollingDriver, RangeScan, ScanSummary};
pub use providers::{AzureQueueProvider, AzureTableProvider, InMemoryProvider};
pub use query::{ComparisonOperator, ContinuationMarker, EntityFilter, QueryPage, TableQuery};
pub use queue::{QueueClient, ReceivedMessages};
pub use table::TableClient;
pub use validation::{EntityValidator, REQUIRED_FIELDS};
