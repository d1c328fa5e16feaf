//! Notion REST API client.

use super::{Block, CollectionQuery, DocumentStore, Page, Record, SortOrder, StoreFilter, MAX_PAGE_SIZE};
use crate::config::NotionSettings;
use crate::error::{AgencyError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    data_sources: Vec<DataSourceRef>,
}

#[derive(Deserialize)]
struct DataSourceRef {
    id: String,
}

/// Notion-backed document store.
pub struct NotionClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_key_env: String,
    base_url: Url,
    api_version: String,
    timeout_secs: u64,
}

impl NotionClient {
    /// Create a client from settings, reading the API key from the configured
    /// environment variable. A missing key is reported on first use.
    pub fn from_settings(settings: &NotionSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(api_key, settings)
    }

    /// Create a client with an explicit API key.
    pub fn new(api_key: Option<String>, settings: &NotionSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AgencyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Url::join drops the last path segment unless it ends with a slash
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| AgencyError::Config(format!("Invalid Notion base URL '{}': {}", base, e)))?;

        Ok(Self {
            http,
            api_key,
            api_key_env: settings.api_key_env.clone(),
            base_url,
            api_version: settings.api_version.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    /// Whether an API key is available.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AgencyError::ConfigurationMissing(format!(
                "{} environment variable not found. Please set your Notion API key.",
                self.api_key_env
            ))
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AgencyError::Config(format!("Invalid Notion endpoint '{}': {}", path, e)))
    }

    async fn send(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(self.api_key()?)
            .header("Notion-Version", &self.api_version)
            .send()
            .await
            .map_err(|e| AgencyError::from_http(operation, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgencyError::RemoteUnavailable(format!(
                "{} returned {}: {}",
                operation, status, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AgencyError::from_http(operation, self.timeout_secs, e))
    }

    fn query_body(query: &CollectionQuery, cursor: Option<&str>) -> Value {
        let mut body = json!({ "page_size": query.page_size.clamp(1, MAX_PAGE_SIZE) });

        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        if let Some(StoreFilter::TitleContains { property, value }) = &query.filter {
            body["filter"] = json!({
                "property": property,
                "title": { "contains": value }
            });
        }

        if let Some(sort) = query.sort {
            let direction = match sort {
                SortOrder::LastEditedDescending => "descending",
                SortOrder::LastEditedAscending => "ascending",
            };
            body["sorts"] = json!([{ "timestamp": "last_edited_time", "direction": direction }]);
        }

        body
    }
}

fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AgencyError::malformed_response(operation, e))
}

#[async_trait]
impl DocumentStore for NotionClient {
    #[instrument(skip(self))]
    async fn resolve_collection(&self, database_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("databases/{}", database_id))?;
        let value = self.send("databases.retrieve", self.http.get(url)).await?;
        let database: DatabaseResponse = decode("databases.retrieve", value)?;

        // Most databases have a single data source
        database
            .data_sources
            .into_iter()
            .next()
            .map(|source| source.id)
            .ok_or_else(|| {
                AgencyError::RemoteUnavailable(format!(
                    "Database {} has no data sources. Cannot query database.",
                    database_id
                ))
            })
    }

    #[instrument(skip(self, query), fields(collection = %query.collection_id))]
    async fn query_collection(
        &self,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<Record>> {
        let url = self.endpoint(&format!("data_sources/{}/query", query.collection_id))?;
        let body = Self::query_body(query, cursor);
        let value = self
            .send("data_sources.query", self.http.post(url).json(&body))
            .await?;
        let list: ListResponse = decode("data_sources.query", value)?;

        let records = list
            .results
            .iter()
            .filter_map(|raw| match Record::from_json(raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable record: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("Fetched {} records (has_more: {})", records.len(), list.has_more);
        Ok(Page::from_parts(records, list.has_more, list.next_cursor))
    }

    #[instrument(skip(self))]
    async fn list_blocks(&self, record_id: &str, cursor: Option<&str>) -> Result<Page<Block>> {
        let mut url = self.endpoint(&format!("blocks/{}/children", record_id))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page_size", &MAX_PAGE_SIZE.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("start_cursor", cursor);
            }
        }

        let value = self.send("blocks.children.list", self.http.get(url)).await?;
        let list: ListResponse = decode("blocks.children.list", value)?;
        let blocks = list.results.iter().map(Block::from_json).collect();

        Ok(Page::from_parts(blocks, list.has_more, list.next_cursor))
    }
}
