//! Cursor-driven retrieval of whole collections and record bodies.

use crate::error::Result;
use crate::notion::{Block, CollectionQuery, DocumentStore, Page, Record};
use std::future::Future;
use tracing::{debug, instrument};

/// Follow a cursor chain until the store reports no more pages.
///
/// Items keep page order. Any failing page aborts the whole listing and the
/// items accumulated so far are dropped.
pub async fn drain_pages<T, F, Fut>(mut next_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = next_page(cursor.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!("Drained {} page(s), {} item(s)", pages, items.len());
    Ok(items)
}

/// Retrieves every record of a collection by walking its pages.
pub struct PaginatedRecordFetcher<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> PaginatedRecordFetcher<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Fetch all records matching the query, in cursor order.
    #[instrument(skip(self, query), fields(collection = %query.collection_id))]
    pub async fn fetch_all(&self, query: &CollectionQuery) -> Result<Vec<Record>> {
        let store = self.store;
        drain_pages(|cursor| async move { store.query_collection(query, cursor.as_deref()).await })
            .await
    }

    /// Fetch the full body of a record.
    #[instrument(skip(self))]
    pub async fn fetch_blocks(&self, record_id: &str) -> Result<Vec<Block>> {
        let store = self.store;
        drain_pages(|cursor| async move { store.list_blocks(record_id, cursor.as_deref()).await })
            .await
    }
}
