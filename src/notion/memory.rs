//! In-memory document store implementation.
//!
//! Useful for testing and offline runs.

use super::{Block, CollectionQuery, DocumentStore, Page, Record, SortOrder, StoreFilter};
use crate::error::{AgencyError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory document store.
///
/// Cursors are stringified offsets. An optional page limit simulates the
/// store's own cap on page size.
pub struct MemoryDocumentStore {
    databases: RwLock<HashMap<String, String>>,
    collections: RwLock<HashMap<String, Vec<Record>>>,
    blocks: RwLock<HashMap<String, Vec<Block>>>,
    max_page_size: Option<usize>,
    fail_after: Option<usize>,
    requests: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
            blocks: RwLock::new(HashMap::new()),
            max_page_size: None,
            fail_after: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Cap every returned page at `size` items regardless of the query.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = Some(size.max(1));
        self
    }

    /// Make every request after the first `requests` fail as unavailable.
    pub fn failing_after(mut self, requests: usize) -> Self {
        self.fail_after = Some(requests);
        self
    }

    /// Register a database whose single collection holds `records`.
    pub fn insert_collection(&self, database_id: &str, collection_id: &str, records: Vec<Record>) {
        self.databases
            .write()
            .unwrap()
            .insert(database_id.to_string(), collection_id.to_string());
        self.collections
            .write()
            .unwrap()
            .insert(collection_id.to_string(), records);
    }

    /// Set the body blocks of a record.
    pub fn insert_blocks(&self, record_id: &str, blocks: Vec<Block>) {
        self.blocks
            .write()
            .unwrap()
            .insert(record_id.to_string(), blocks);
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn record_request(&self) -> Result<()> {
        let served = self.requests.fetch_add(1, Ordering::SeqCst);
        match self.fail_after {
            Some(limit) if served >= limit => Err(AgencyError::RemoteUnavailable(format!(
                "simulated failure on request {}",
                served + 1
            ))),
            _ => Ok(()),
        }
    }

    fn paginate<T: Clone>(&self, items: &[T], page_size: usize, cursor: Option<&str>) -> Result<Page<T>> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| AgencyError::RemoteUnavailable(format!("invalid cursor: {}", c)))?,
            None => 0,
        };
        let size = match self.max_page_size {
            Some(max) => page_size.min(max),
            None => page_size,
        }
        .max(1);

        let end = (start + size).min(items.len());
        let slice = items.get(start..end).unwrap_or_default().to_vec();
        let has_more = end < items.len();

        Ok(Page::from_parts(slice, has_more, Some(end.to_string())))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn resolve_collection(&self, database_id: &str) -> Result<String> {
        self.record_request()?;
        self.databases
            .read()
            .unwrap()
            .get(database_id)
            .cloned()
            .ok_or_else(|| {
                AgencyError::RemoteUnavailable(format!("Database {} not found", database_id))
            })
    }

    async fn query_collection(
        &self,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<Record>> {
        self.record_request()?;

        let mut records = self
            .collections
            .read()
            .unwrap()
            .get(&query.collection_id)
            .cloned()
            .ok_or_else(|| {
                AgencyError::RemoteUnavailable(format!(
                    "Collection {} not found",
                    query.collection_id
                ))
            })?;

        if let Some(StoreFilter::TitleContains { property, value }) = &query.filter {
            let needle = value.to_lowercase();
            records.retain(|r| r.text(property).to_lowercase().contains(&needle));
        }

        // Stable sorts keep insertion order among equal timestamps
        match query.sort {
            Some(SortOrder::LastEditedDescending) => {
                records.sort_by(|a, b| b.last_edited.cmp(&a.last_edited))
            }
            Some(SortOrder::LastEditedAscending) => {
                records.sort_by(|a, b| a.last_edited.cmp(&b.last_edited))
            }
            None => {}
        }

        self.paginate(&records, query.page_size, cursor)
    }

    async fn list_blocks(&self, record_id: &str, cursor: Option<&str>) -> Result<Page<Block>> {
        self.record_request()?;
        let blocks = self
            .blocks
            .read()
            .unwrap()
            .get(record_id)
            .cloned()
            .unwrap_or_default();
        self.paginate(&blocks, super::MAX_PAGE_SIZE, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::{BlockKind, PropertyValue, TextSpan};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, title: &str, day: u32) -> Record {
        Record::new(id, Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap())
            .with_property("Name", PropertyValue::Title(vec![TextSpan::plain(title)]))
    }

    #[tokio::test]
    async fn test_memory_store_filters_sorts_and_pages() {
        let store = MemoryDocumentStore::new();
        store.insert_collection(
            "db",
            "ds",
            vec![
                record("a", "Old Script", 1),
                record("b", "Thumbnail", 2),
                record("c", "New script", 3),
            ],
        );

        let query = CollectionQuery::new("ds")
            .with_page_size(1)
            .with_filter(StoreFilter::TitleContains {
                property: "Name".to_string(),
                value: "Script".to_string(),
            })
            .with_sort(SortOrder::LastEditedDescending);

        let first = store.query_collection(&query, None).await.unwrap();
        assert_eq!(first.items[0].id, "c");
        assert!(first.has_more());

        let second = store
            .query_collection(&query, first.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.items[0].id, "a");
        assert!(!second.has_more());
    }

    #[tokio::test]
    async fn test_memory_store_blocks_and_failures() {
        let store = MemoryDocumentStore::new().failing_after(1);
        store.insert_blocks("a", vec![Block::text(BlockKind::Paragraph, "Hello")]);

        let page = store.list_blocks("a", None).await.unwrap();
        assert_eq!(page.items.len(), 1);

        let err = store.list_blocks("a", None).await.unwrap_err();
        assert!(matches!(err, AgencyError::RemoteUnavailable(_)));
        assert_eq!(store.request_count(), 2);
    }
}
