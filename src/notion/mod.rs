//! Document store abstraction.
//!
//! Reference material (title frameworks, past scripts) lives in Notion
//! databases. This module provides a trait-based interface over the store
//! plus the typed records and blocks it returns.

mod client;
mod memory;
mod types;

pub use client::NotionClient;
pub use memory::MemoryDocumentStore;
pub use types::{
    parse_rich_text, spans_to_plain, Annotations, Block, BlockKind, Page, PropertyValue, Record,
    TextSpan,
};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Largest page size the store accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// A filter pushed down to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreFilter {
    /// Case-insensitive substring match on a title property.
    TitleContains { property: String, value: String },
}

/// Result ordering requested from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    LastEditedDescending,
    LastEditedAscending,
}

/// A collection query. The cursor is supplied per page.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub collection_id: String,
    pub page_size: usize,
    pub filter: Option<StoreFilter>,
    pub sort: Option<SortOrder>,
}

impl CollectionQuery {
    /// Query every record of a collection in store order.
    pub fn new(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            page_size: MAX_PAGE_SIZE,
            filter: None,
            sort: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_filter(mut self, filter: StoreFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Trait for document store implementations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve a database id to the id of the collection that can be queried.
    async fn resolve_collection(&self, database_id: &str) -> Result<String>;

    /// Fetch one page of records. `cursor` is `None` for the first page.
    async fn query_collection(
        &self,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<Record>>;

    /// Fetch one page of a record's body blocks.
    async fn list_blocks(&self, record_id: &str, cursor: Option<&str>) -> Result<Page<Block>>;
}
