//! Tests for the in-memory provider.

use super::*;
use crate::query::{ComparisonOperator, EntityFilter};

fn table() -> TableName {
    TableName::new("sampletable").unwrap()
}

fn queue() -> QueueName {
    QueueName::new("requests").unwrap()
}

async fn provider_with_table() -> InMemoryProvider {
    let provider = InMemoryProvider::default();
    provider.create_table(&table()).await.unwrap();
    provider
}

fn row(partition_key: &str, row_key: &str) -> Entity {
    Entity::new(partition_key, row_key).with("ID", row_key)
}

// ============================================================================
// Tables
// ============================================================================

mod table_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_delete_table_report_changes() {
        let provider = InMemoryProvider::default();

        assert!(!provider.table_exists(&table()).await.unwrap());
        assert!(provider.create_table(&table()).await.unwrap());
        assert!(!provider.create_table(&table()).await.unwrap());
        assert!(provider.table_exists(&table()).await.unwrap());

        assert!(provider.delete_table(&table()).await.unwrap());
        assert!(!provider.delete_table(&table()).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_fails() {
        let provider = InMemoryProvider::default();

        let result = provider.insert_entity(&table(), &row("p", "1")).await;

        assert!(matches!(result, Err(StorageError::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn test_insert_duplicate_keys_fails() {
        let provider = provider_with_table().await;
        provider.insert_entity(&table(), &row("p", "1")).await.unwrap();

        let result = provider.insert_entity(&table(), &row("p", "1")).await;

        assert!(matches!(
            result,
            Err(StorageError::EntityAlreadyExists { ref row_key, .. }) if row_key == "1"
        ));
    }

    #[tokio::test]
    async fn test_get_returns_stored_properties_with_etag_and_timestamp() {
        let provider = provider_with_table().await;
        let etag = provider
            .insert_entity(&table(), &row("p", "1").with("Count", 3))
            .await
            .unwrap();

        let entity = provider.get_entity(&table(), "p", "1").await.unwrap();

        assert_eq!(entity, row("p", "1").with("Count", 3));
        assert_eq!(entity.etag(), Some(etag.as_str()));
        assert!(entity.timestamp().is_some());
    }

    #[tokio::test]
    async fn test_update_replaces_entity_and_changes_etag() {
        let provider = provider_with_table().await;
        let first = provider
            .insert_entity(&table(), &row("p", "1").with("Old", true))
            .await
            .unwrap();

        let second = provider
            .update_entity(&table(), &row("p", "1").with("New", true))
            .await
            .unwrap();

        let entity = provider.get_entity(&table(), "p", "1").await.unwrap();
        assert_ne!(first, second);
        assert!(entity.contains_key("New"));
        assert!(!entity.contains_key("Old"));
    }

    #[tokio::test]
    async fn test_update_missing_entity_fails() {
        let provider = provider_with_table().await;

        let result = provider.update_entity(&table(), &row("p", "1")).await;

        assert!(matches!(result, Err(StorageError::EntityNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_entity() {
        let provider = provider_with_table().await;
        provider.insert_entity(&table(), &row("p", "1")).await.unwrap();

        provider.delete_entity(&table(), "p", "1").await.unwrap();

        let result = provider.get_entity(&table(), "p", "1").await;
        assert!(matches!(result, Err(StorageError::EntityNotFound { .. })));
        let again = provider.delete_entity(&table(), "p", "1").await;
        assert!(matches!(again, Err(StorageError::EntityNotFound { .. })));
    }

    #[tokio::test]
    async fn test_written_timestamp_is_replaced_by_server_value() {
        let provider = provider_with_table().await;
        let entity = row("p", "1").with(TIMESTAMP, "1999-01-01T00:00:00Z");

        provider.insert_entity(&table(), &entity).await.unwrap();

        let stored = provider.get_entity(&table(), "p", "1").await.unwrap();
        assert_ne!(stored.timestamp(), Some("1999-01-01T00:00:00Z"));
    }
}

// ============================================================================
// Queries
// ============================================================================

mod query_tests {
    use super::*;

    async fn provider_with_rows(count: usize) -> InMemoryProvider {
        let provider = provider_with_table().await;
        for i in 0..count {
            provider
                .insert_entity(&table(), &row("p", &format!("{:03}", i)))
                .await
                .unwrap();
        }
        provider
            .insert_entity(&table(), &row("other", "000"))
            .await
            .unwrap();
        provider
    }

    #[tokio::test]
    async fn test_query_filters_and_orders_by_key() {
        let provider = provider_with_rows(5).await;
        let query = TableQuery::new(EntityFilter::partition_key(ComparisonOperator::Eq, "p"));

        let page = provider.query_entities(&table(), &query).await.unwrap();

        let rows: Vec<_> = page.items().iter().filter_map(|e| e.row_key()).collect();
        assert_eq!(rows, vec!["000", "001", "002", "003", "004"]);
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn test_query_pages_with_markers() {
        let provider = provider_with_rows(5).await;
        let filter = EntityFilter::row_key_between("p", "", "999");

        let first = provider
            .query_entities(&table(), &TableQuery::new(filter.clone()).with_top(2))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        let marker = first.next_marker.clone().unwrap();
        assert_eq!(marker.next_partition_key(), "p");
        assert_eq!(marker.next_row_key(), Some("002"));

        let second = provider
            .query_entities(
                &table(),
                &TableQuery::new(filter.clone())
                    .with_top(2)
                    .with_marker(Some(marker)),
            )
            .await
            .unwrap();
        assert_eq!(second.items()[0].row_key(), Some("002"));

        let third = provider
            .query_entities(
                &table(),
                &TableQuery::new(filter)
                    .with_top(2)
                    .with_marker(second.next_marker.clone()),
            )
            .await
            .unwrap();
        assert_eq!(third.len(), 1);
        assert!(third.is_last());
    }

    #[tokio::test]
    async fn test_full_last_page_has_no_marker() {
        let provider = provider_with_rows(4).await;
        let filter = EntityFilter::row_key_between("p", "", "999");

        let first = provider
            .query_entities(&table(), &TableQuery::new(filter.clone()).with_top(2))
            .await
            .unwrap();
        let second = provider
            .query_entities(
                &table(),
                &TableQuery::new(filter)
                    .with_top(2)
                    .with_marker(first.next_marker),
            )
            .await
            .unwrap();

        assert_eq!(second.len(), 2);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_query_missing_table_fails() {
        let provider = InMemoryProvider::default();
        let query = TableQuery::new(EntityFilter::partition_key(ComparisonOperator::Eq, "p"));

        let result = provider.query_entities(&table(), &query).await;

        assert!(matches!(result, Err(StorageError::TableNotFound { .. })));
    }
}

// ============================================================================
// Queues
// ============================================================================

mod queue_tests {
    use super::*;

    async fn provider_with_queue() -> InMemoryProvider {
        let provider = InMemoryProvider::default();
        provider.create_queue(&queue()).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_create_and_delete_queue_report_changes() {
        let provider = InMemoryProvider::default();

        assert!(provider.create_queue(&queue()).await.unwrap());
        assert!(!provider.create_queue(&queue()).await.unwrap());
        assert!(provider.queue_exists(&queue()).await.unwrap());
        assert!(provider.delete_queue(&queue()).await.unwrap());
        assert!(!provider.queue_exists(&queue()).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_to_missing_queue_fails() {
        let provider = InMemoryProvider::default();

        let result = provider.put_message(&queue(), "hello").await;

        assert!(matches!(result, Err(StorageError::QueueNotFound { .. })));
    }

    #[tokio::test]
    async fn test_messages_are_received_in_order_and_hidden() {
        let provider = provider_with_queue().await;
        for body in ["one", "two", "three"] {
            provider.put_message(&queue(), body).await.unwrap();
        }

        let received = provider.get_messages(&queue(), 2).await.unwrap();
        let again = provider.get_messages(&queue(), 32).await.unwrap();

        let contents: Vec<_> = received.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert!(received.iter().all(|m| m.dequeue_count == 1));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].content, "three");
    }

    #[tokio::test]
    async fn test_zero_visibility_timeout_redelivers() {
        let provider = InMemoryProvider::new(InMemoryConfig {
            visibility_timeout: Duration::zero(),
            ..Default::default()
        });
        provider.create_queue(&queue()).await.unwrap();
        provider.put_message(&queue(), "retry").await.unwrap();

        provider.get_messages(&queue(), 1).await.unwrap();
        let second = provider.get_messages(&queue(), 1).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].dequeue_count, 2);
    }

    #[tokio::test]
    async fn test_delete_message_requires_current_receipt() {
        let provider = provider_with_queue().await;
        let sent = provider.put_message(&queue(), "hello").await.unwrap();
        let received = provider.get_messages(&queue(), 1).await.unwrap().remove(0);

        let stale = provider
            .delete_message(&queue(), &received.id, &sent.pop_receipt)
            .await;
        assert!(matches!(stale, Err(StorageError::InvalidReceipt { .. })));

        provider
            .delete_message(&queue(), &received.id, &received.pop_receipt)
            .await
            .unwrap();
        assert_eq!(provider.queue_len(&queue()).await, Some(0));

        let gone = provider
            .delete_message(&queue(), &received.id, &received.pop_receipt)
            .await;
        assert!(matches!(gone, Err(StorageError::MessageNotFound { .. })));
    }

    #[tokio::test]
    async fn test_expired_messages_are_dropped() {
        let provider = InMemoryProvider::new(InMemoryConfig {
            message_ttl: Duration::zero(),
            ..Default::default()
        });
        provider.create_queue(&queue()).await.unwrap();
        provider.put_message(&queue(), "short-lived").await.unwrap();

        let received = provider.get_messages(&queue(), 1).await.unwrap();

        assert!(received.is_empty());
        assert_eq!(provider.queue_len(&queue()).await, Some(0));
    }
}
