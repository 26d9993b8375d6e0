//! Queue client: queue management and message put/get/delete.

use crate::client::QueueProvider;
use crate::error::{StorageError, ValidationError};
use crate::message::{MessageId, PopReceipt, QueueMessage, QueueName};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Largest batch the queue service hands out per request
pub const MAX_MESSAGES_PER_GET: u32 = 32;

/// Client for one queue storage account
#[derive(Clone)]
pub struct QueueClient {
    provider: Arc<dyn QueueProvider>,
}

impl QueueClient {
    /// Create a client over a provider
    pub fn new(provider: Arc<dyn QueueProvider>) -> Self {
        Self { provider }
    }

    /// Check whether a queue exists
    pub async fn queue_exists(&self, queue: &QueueName) -> Result<bool, StorageError> {
        self.provider.queue_exists(queue).await
    }

    /// Create a queue unless it already exists
    ///
    /// Returns `true` when the queue was created by this call.
    pub async fn create_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        if self.provider.queue_exists(queue).await? {
            debug!(queue = %queue, "Queue already exists");
            return Ok(false);
        }

        let created = self.provider.create_queue(queue).await?;
        if created {
            info!(queue = %queue, "Created queue");
        }
        Ok(created)
    }

    /// Delete a queue and every message in it
    ///
    /// Returns `false` when there was no queue to delete.
    pub async fn delete_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        let deleted = self.provider.delete_queue(queue).await?;
        if deleted {
            info!(queue = %queue, "Deleted queue");
        }
        Ok(deleted)
    }

    /// Enqueue a message
    ///
    /// The content is sent as is. The returned message carries the id and
    /// pop receipt assigned by the service.
    pub async fn put(&self, queue: &QueueName, message: &str) -> Result<QueueMessage, StorageError> {
        let sent = self.provider.put_message(queue, message).await?;
        info!(
            queue = %queue,
            message_id = %sent.id,
            content = %message,
            "Message enqueued"
        );
        Ok(sent)
    }

    /// Dequeue up to `num_messages` visible messages
    ///
    /// Dequeued messages are hidden from other consumers until their lease
    /// expires; they stay in the queue until deleted with their pop receipt.
    ///
    /// # Errors
    ///
    /// `num_messages` must be between 1 and 32.
    pub async fn get(
        &self,
        queue: &QueueName,
        num_messages: u32,
    ) -> Result<ReceivedMessages, StorageError> {
        if num_messages == 0 || num_messages > MAX_MESSAGES_PER_GET {
            return Err(ValidationError::OutOfRange {
                field: "num_messages".to_string(),
                message: format!("must be 1-{}", MAX_MESSAGES_PER_GET),
            }
            .into());
        }

        let messages = self.provider.get_messages(queue, num_messages).await?;
        debug!(queue = %queue, count = messages.len(), "Messages dequeued");
        Ok(ReceivedMessages::new(queue.clone(), messages))
    }

    /// Delete a dequeued message
    ///
    /// Fails with `MessageNotFound` when the message is already gone and with
    /// `InvalidReceipt` when the receipt is stale, e.g. because the lease
    /// expired and another consumer dequeued the message.
    pub async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), StorageError> {
        self.provider
            .delete_message(queue, message_id, pop_receipt)
            .await?;
        info!(queue = %queue, message_id = %message_id, "Message deleted");
        Ok(())
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

/// Messages returned by one [`QueueClient::get`] call
///
/// Each message is logged as it is pulled from the iterator. The sequence is
/// finite and cannot be restarted; call `get` again for more messages.
#[derive(Debug)]
pub struct ReceivedMessages {
    queue: QueueName,
    messages: std::vec::IntoIter<QueueMessage>,
}

impl ReceivedMessages {
    fn new(queue: QueueName, messages: Vec<QueueMessage>) -> Self {
        Self {
            queue,
            messages: messages.into_iter(),
        }
    }

    /// Queue the messages came from
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }
}

impl Iterator for ReceivedMessages {
    type Item = QueueMessage;

    fn next(&mut self) -> Option<Self::Item> {
        let message = self.messages.next()?;
        info!(
            queue = %self.queue,
            id = %message.id,
            content = %message.content,
            "Received message"
        );
        Some(message)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.messages.size_hint()
    }
}

impl ExactSizeIterator for ReceivedMessages {}
