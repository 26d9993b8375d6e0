//! Paginated range scan over one partition.
//!
//! The driver walks a row-key range page by page, following continuation
//! markers until the service reports no more pages. Every entity on a page
//! is read again by its identifier before it is handed to an
//! [`EntityHandler`]; entities deleted in the meantime are skipped.
//!
//! ```text
//! Fetching { marker } --page--> Processing { page } --marker--> Fetching
//!                                                   --none----> Done
//! ```

use crate::entity::{Entity, TableName};
use crate::error::StorageError;
use crate::query::{ContinuationMarker, QueryPage};
use crate::table::TableClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "polling_tests.rs"]
mod tests;

/// Property used to re-read an entity unless configured otherwise
pub const DEFAULT_ID_FIELD: &str = "ID";

/// Entities per page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: u32 = 10;

// ============================================================================
// Scan Definition
// ============================================================================

/// The range walked by a [`PollingDriver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeScan {
    pub table: TableName,
    pub partition_key: String,
    /// Exclusive lower row-key bound
    pub min_row_key: String,
    /// Exclusive upper row-key bound
    pub max_row_key: String,
    pub page_size: u32,
    /// Property holding the row key used to re-read each entity
    pub id_field: String,
}

impl RangeScan {
    /// Scan `min_row_key < RowKey < max_row_key` within a partition
    pub fn new(
        table: TableName,
        partition_key: impl Into<String>,
        min_row_key: impl Into<String>,
        max_row_key: impl Into<String>,
    ) -> Self {
        Self {
            table,
            partition_key: partition_key.into(),
            min_row_key: min_row_key.into(),
            max_row_key: max_row_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// Set the number of entities fetched per page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the property used to re-read each entity
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }
}

// ============================================================================
// Entity Handlers
// ============================================================================

/// Receives every entity that is still present when re-read
#[async_trait]
pub trait EntityHandler: Send + Sync {
    /// Process one entity; an error stops the scan
    async fn handle(&self, entity: &Entity) -> Result<(), StorageError>;
}

/// Handler that only logs the entity
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl EntityHandler for LoggingHandler {
    async fn handle(&self, entity: &Entity) -> Result<(), StorageError> {
        info!(entity = %entity, "Processing entity");
        Ok(())
    }
}

/// Counters reported at the end of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Query calls made
    pub pages: usize,
    /// Entities returned by the queries
    pub entities_seen: usize,
    /// Entities handed to the handler
    pub processed: usize,
    /// Entities gone by the time they were re-read
    pub skipped: usize,
}

// ============================================================================
// Polling Driver
// ============================================================================

enum ScanState {
    Fetching { marker: Option<ContinuationMarker> },
    Processing { page: QueryPage },
    Done,
}

/// Walks a [`RangeScan`] page by page
pub struct PollingDriver<H = LoggingHandler> {
    client: TableClient,
    handler: H,
}

impl PollingDriver<LoggingHandler> {
    /// Create a driver that logs every entity it sees
    pub fn new(client: TableClient) -> Self {
        Self::with_handler(client, LoggingHandler)
    }
}

impl<H: EntityHandler> PollingDriver<H> {
    /// Create a driver with a custom entity handler
    pub fn with_handler(client: TableClient, handler: H) -> Self {
        Self { client, handler }
    }

    /// Handler receiving the entities
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run the scan to completion
    ///
    /// # Errors
    ///
    /// Any query error, any re-read error other than `EntityNotFound`, and
    /// any handler error ends the scan.
    pub async fn run(&self, scan: &RangeScan) -> Result<ScanSummary, StorageError> {
        let mut summary = ScanSummary::default();
        let mut state = ScanState::Fetching { marker: None };

        info!(
            table = %scan.table,
            partition_key = %scan.partition_key,
            min_row_key = %scan.min_row_key,
            max_row_key = %scan.max_row_key,
            page_size = scan.page_size,
            "Starting range scan"
        );

        loop {
            state = match state {
                ScanState::Fetching { marker } => {
                    let page = self
                        .client
                        .query_between_rowkey(
                            &scan.table,
                            &scan.partition_key,
                            &scan.min_row_key,
                            &scan.max_row_key,
                            scan.page_size,
                            marker,
                        )
                        .await?;
                    summary.pages += 1;
                    ScanState::Processing { page }
                }
                ScanState::Processing { page } => {
                    if !page.is_empty() {
                        info!(table = %scan.table, count = page.len(), "Processing entities retrieved");
                    }

                    let next_marker = page.next_marker.clone();
                    for entity in page {
                        summary.entities_seen += 1;
                        if self.process(scan, &entity).await? {
                            summary.processed += 1;
                        } else {
                            summary.skipped += 1;
                        }
                    }

                    match next_marker {
                        Some(marker) => ScanState::Fetching {
                            marker: Some(marker),
                        },
                        None => ScanState::Done,
                    }
                }
                ScanState::Done => break,
            };
        }

        info!(
            table = %scan.table,
            pages = summary.pages,
            processed = summary.processed,
            skipped = summary.skipped,
            "Range scan complete"
        );
        Ok(summary)
    }

    /// Re-read one entity and hand it to the handler
    ///
    /// Returns `false` when the entity was skipped.
    async fn process(&self, scan: &RangeScan, entity: &Entity) -> Result<bool, StorageError> {
        let Some(id) = entity_id(entity, &scan.id_field) else {
            warn!(entity = %entity, id_field = %scan.id_field, "Entity has no identifier, skipped");
            return Ok(false);
        };

        match self
            .client
            .get_entity(&scan.table, &scan.partition_key, &id)
            .await
        {
            Ok(current) => {
                self.handler.handle(&current).await?;
                Ok(true)
            }
            Err(e) if e.is_entity_not_found() => {
                debug!(request_id = %id, "Request entity not found, skipped call");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl<H> std::fmt::Debug for PollingDriver<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingDriver")
            .field("client", &self.client)
            .finish()
    }
}

/// Identifier of an entity: the id field when present, else its row key
fn entity_id(entity: &Entity, id_field: &str) -> Option<String> {
    match entity.get(id_field) {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => entity.row_key().map(str::to_string),
    }
}
