//! # Notion v3 client
//!
//! Implements [`RemoteSource`] and [`AssetFetcher`] against the private JSON
//! API that the Notion web app itself uses. Three endpoints cover everything
//! the pipeline needs:
//!
//! - `getRecordValues`: raw block records, used for versions, database
//!   metadata and children that a page chunk did not include.
//! - `loadPageChunk`: the blocks of one page, paged through with a cursor.
//! - `queryCollection`: the schema and page ids of one database view.
//!
//! Private pages need the `token_v2` cookie of a logged-in browser session.
//! Public pages work without it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use notion_hexo_core::contract::{AssetFetcher, RemoteError, RemoteSource};
use notion_hexo_core::model::{
    Block, BlockKind, CollectionMetadata, CollectionQuery, ColumnType, Page, RecordVersion,
    SchemaColumn,
};
use notion_hexo_core::PageId;

pub const NOTION_BASE_URL: &str = "https://www.notion.so";

/// Upper bound on ids per `getRecordValues` request.
const RECORD_BATCH: usize = 100;
const CHUNK_LIMIT: u32 = 100;
const COLLECTION_LIMIT: u32 = 1000;

pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    time_zone: String,
}

impl NotionClient {
    pub fn new(token: Option<String>, timeout: Duration, time_zone: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        info!(
            authenticated = token.is_some(),
            timeout_secs = timeout.as_secs(),
            "Initialised Notion client"
        );
        Ok(Self {
            http,
            base_url: NOTION_BASE_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
            time_zone: time_zone.to_string(),
        })
    }

    /// Point the client at another host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorise(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(COOKIE, format!("token_v2={token}")),
            None => request,
        }
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T, RemoteError> {
        let url = format!("{}/api/v3/{}", self.base_url, endpoint);
        debug!(endpoint, "Calling Notion API");
        let response = self.authorise(self.http.post(&url).json(body)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(endpoint, status = %status, body = %text, "Notion API call failed");
            return Err(format!("{endpoint} returned {status}: {text}").into());
        }
        Ok(response.json::<T>().await?)
    }

    /// Block records for `ids`, in request order. Missing records are `None`.
    async fn block_records(&self, ids: &[PageId]) -> Result<Vec<Option<Block>>, RemoteError> {
        let requests = ids.chunks(RECORD_BATCH).map(|chunk| async move {
            let body = json!({
                "requests": chunk
                    .iter()
                    .map(|id| json!({ "table": "block", "id": id.dashed() }))
                    .collect::<Vec<_>>()
            });
            let response: RecordValuesResponse = self.post("getRecordValues", &body).await?;
            if response.results.len() != chunk.len() {
                return Err(format!(
                    "getRecordValues returned {} results for {} ids",
                    response.results.len(),
                    chunk.len()
                )
                .into());
            }
            Ok::<_, RemoteError>(
                response
                    .results
                    .into_iter()
                    .map(RecordResult::into_block)
                    .collect::<Vec<_>>(),
            )
        });
        Ok(try_join_all(requests).await?.into_iter().flatten().collect())
    }
}

#[derive(Debug, Deserialize)]
struct RecordValuesResponse {
    #[serde(default)]
    results: Vec<RecordResult>,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    #[serde(default)]
    value: Option<Value>,
}

impl RecordResult {
    fn into_block(self) -> Option<Block> {
        let value = self.value?;
        if value.get("alive") == Some(&Value::Bool(false)) {
            return None;
        }
        serde_json::from_value(value)
            .map_err(|e| warn!(error = %e, "Skipping undecodable block record"))
            .ok()
    }
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordMap {
    #[serde(default)]
    block: HashMap<String, RecordEntry>,
    #[serde(default)]
    collection: HashMap<String, CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct Cursor {
    #[serde(default)]
    stack: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageChunkResponse {
    #[serde(default)]
    record_map: RecordMap,
    cursor: Option<Cursor>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    value: Option<CollectionValue>,
}

#[derive(Debug, Deserialize)]
struct CollectionValue {
    #[serde(default)]
    schema: BTreeMap<String, SchemaEntry>,
}

#[derive(Debug, Deserialize)]
struct SchemaEntry {
    name: String,
    #[serde(rename = "type")]
    kind: ColumnType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryCollectionResponse {
    result: QueryResult,
    #[serde(default)]
    record_map: RecordMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    block_ids: Vec<PageId>,
}

fn blocks_of(record_map: RecordMap) -> impl Iterator<Item = Block> {
    record_map
        .block
        .into_values()
        .filter_map(|entry| RecordResult { value: entry.value }.into_block())
}

fn schema_of(collection_id: PageId, record_map: &RecordMap) -> Result<Vec<SchemaColumn>, RemoteError> {
    let collection = record_map
        .collection
        .get(&collection_id.dashed())
        .and_then(|entry| entry.value.as_ref())
        .ok_or_else(|| format!("collection {collection_id} missing from query response"))?;
    Ok(collection
        .schema
        .iter()
        .map(|(id, entry)| SchemaColumn {
            id: id.clone(),
            name: entry.name.clone(),
            kind: entry.kind.clone(),
        })
        .collect())
}

/// Children referenced by non-page blocks that are not loaded yet.
fn missing_children(page_id: PageId, blocks: &HashMap<PageId, Block>) -> Vec<PageId> {
    let mut missing = HashSet::new();
    for block in blocks.values() {
        if block.kind == BlockKind::Page && block.id != page_id {
            continue;
        }
        for child in &block.content {
            if !blocks.contains_key(child) {
                missing.insert(*child);
            }
        }
    }
    let mut missing: Vec<_> = missing.into_iter().collect();
    missing.sort();
    missing
}

#[async_trait]
impl RemoteSource for NotionClient {
    async fn latest_versions(&self, ids: &[PageId]) -> Result<Vec<Option<RecordVersion>>, RemoteError> {
        let records = self.block_records(ids).await?;
        Ok(records
            .into_iter()
            .map(|block| {
                block.map(|b| RecordVersion {
                    id: b.id,
                    version: b.version,
                })
            })
            .collect())
    }

    async fn fetch_page(&self, id: PageId) -> Result<Page, RemoteError> {
        let mut blocks: HashMap<PageId, Block> = HashMap::new();
        let mut cursor = json!({ "stack": [] });
        let mut chunk_number = 0;
        loop {
            let body = json!({
                "pageId": id.dashed(),
                "limit": CHUNK_LIMIT,
                "cursor": cursor,
                "chunkNumber": chunk_number,
                "verticalColumns": false,
            });
            let response: PageChunkResponse = self.post("loadPageChunk", &body).await?;
            blocks.extend(blocks_of(response.record_map).map(|b| (b.id, b)));
            match response.cursor {
                Some(next) if !next.stack.is_empty() => {
                    cursor = json!({ "stack": next.stack });
                    chunk_number += 1;
                }
                _ => break,
            }
        }

        loop {
            let missing = missing_children(id, &blocks);
            if missing.is_empty() {
                break;
            }
            debug!(page_id = %id, missing = missing.len(), "Fetching blocks not in page chunk");
            let fetched = self.block_records(&missing).await?;
            let mut progressed = false;
            for (child, block) in missing.iter().zip(fetched) {
                match block {
                    Some(block) => {
                        blocks.insert(block.id, block);
                        progressed = true;
                    }
                    None => warn!(page_id = %id, block_id = %child, "Child block not available"),
                }
            }
            if !progressed {
                break;
            }
        }

        info!(page_id = %id, blocks = blocks.len(), "Fetched page");
        Ok(Page::new(id, blocks.into_values())?)
    }

    async fn query_collection(
        &self,
        collection_id: PageId,
        view_id: PageId,
    ) -> Result<CollectionQuery, RemoteError> {
        let body = json!({
            "collectionId": collection_id.dashed(),
            "collectionViewId": view_id.dashed(),
            "query": {},
            "loader": {
                "type": "table",
                "limit": COLLECTION_LIMIT,
                "searchQuery": "",
                "userTimeZone": self.time_zone,
                "loadContentCover": false,
            },
        });
        let response: QueryCollectionResponse = self.post("queryCollection", &body).await?;
        let schema = schema_of(collection_id, &response.record_map)?;
        Ok(CollectionQuery {
            schema,
            block_ids: response.result.block_ids,
        })
    }

    async fn collection_metadata(&self, id: PageId) -> Result<CollectionMetadata, RemoteError> {
        let block = self
            .block_records(&[id])
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| format!("database page {id} not found or not shared"))?;
        Ok(CollectionMetadata {
            kind: block.kind,
            collection_id: block.collection_id,
            view_ids: block.view_ids,
        })
    }
}

#[async_trait]
impl AssetFetcher for NotionClient {
    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>, RemoteError> {
        let url = format!(
            "{}/image/{}",
            self.base_url,
            utf8_percent_encode(source_url, NON_ALPHANUMERIC)
        );
        let response = self.authorise(self.http.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(source = source_url, status = %status, "Image download failed");
            return Err(format!("image {source_url} returned {status}").into());
        }
        Ok(response.bytes().await?.to_vec())
    }
}
