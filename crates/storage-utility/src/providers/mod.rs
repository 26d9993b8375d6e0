//! Storage provider implementations.
//!
//! This module contains concrete implementations of the `TableProvider` and
//! `QueueProvider` traits for the Azure storage REST API and for an
//! in-process backend.

pub mod azure;
pub mod azure_queue;
pub mod azure_table;
pub mod memory;
pub mod shared_key;

pub use azure::AzureStorageError;
pub use azure_queue::AzureQueueProvider;
pub use azure_table::AzureTableProvider;
pub use memory::{InMemoryConfig, InMemoryProvider};
pub use shared_key::SharedKeySigner;
