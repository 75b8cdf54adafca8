//! Fixtures shared by the integration tests: page builders and an in-memory
//! Notion workspace.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use notion_hexo_core::contract::{RemoteError, RemoteSource};
use notion_hexo_core::id::PageId;
use notion_hexo_core::model::{
    Block, BlockKind, CollectionMetadata, CollectionQuery, ColumnType, Page, RecordVersion,
    SchemaColumn,
};

/// 2020-01-01T00:00:00Z
pub const CREATED: i64 = 1_577_836_800_000;
/// 2020-01-02T00:00:00Z
pub const EDITED: i64 = 1_577_923_200_000;

pub fn id(n: u32) -> PageId {
    PageId::parse(&format!("{n:032x}")).unwrap()
}

pub fn collection_id() -> PageId {
    id(0xC011)
}

pub fn view_id() -> PageId {
    id(0x7E1)
}

pub fn database_id() -> PageId {
    id(0xDB)
}

pub fn block(id: PageId, kind: BlockKind, properties: Value) -> Block {
    Block {
        id,
        version: 1,
        kind,
        properties: serde_json::from_value(properties).unwrap(),
        format: None,
        content: Vec::new(),
        created_time: CREATED,
        last_edited_time: EDITED,
        parent_id: None,
        collection_id: None,
        view_ids: Vec::new(),
    }
}

pub fn text(id: PageId, content: &str) -> Block {
    block(id, BlockKind::Text, json!({ "title": [[content]] }))
}

/// Builds a page whose root has the given children in order.
pub struct PageBuilder {
    root: Block,
    blocks: Vec<Block>,
}

impl PageBuilder {
    pub fn new(id: PageId, title: &str) -> Self {
        Self {
            root: block(id, BlockKind::Page, json!({ "title": [[title]] })),
            blocks: Vec::new(),
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.root.version = version;
        self
    }

    pub fn prop(mut self, key: &str, value: Value) -> Self {
        self.root.properties.insert(key.to_string(), value);
        self
    }

    pub fn child(mut self, child: Block) -> Self {
        self.root.content.push(child.id);
        self.blocks.push(child);
        self
    }

    /// Nest `grandchild` under the most recently added child.
    pub fn nested(mut self, grandchild: Block) -> Self {
        let parent = self.blocks.last_mut().expect("a child to nest under");
        parent.content.push(grandchild.id);
        self.blocks.push(grandchild);
        self
    }

    pub fn link(self, target: PageId, title: &str) -> Self {
        self.child(block(target, BlockKind::Page, json!({ "title": [[title]] })))
    }

    pub fn build(self) -> Page {
        let id = self.root.id;
        Page::new(id, std::iter::once(self.root).chain(self.blocks)).unwrap()
    }
}

pub fn column(id: &str, name: &str, kind: ColumnType) -> SchemaColumn {
    SchemaColumn {
        id: id.to_string(),
        name: name.to_string(),
        kind,
    }
}

pub fn blog_schema() -> Vec<SchemaColumn> {
    vec![
        column("title", "Title", ColumnType::Title),
        column("tg", "Tags", ColumnType::MultiSelect),
        column("st", "Status", ColumnType::Select),
    ]
}

#[derive(Default)]
struct Workspace {
    pages: HashMap<PageId, Page>,
    listed: Vec<PageId>,
    schema: Vec<SchemaColumn>,
    fetched: Vec<PageId>,
}

/// A Notion workspace held in memory. Counts page fetches.
#[derive(Default)]
pub struct FakeNotion {
    inner: Mutex<Workspace>,
}

impl FakeNotion {
    pub fn new(schema: Vec<SchemaColumn>) -> Self {
        Self {
            inner: Mutex::new(Workspace {
                schema,
                ..Workspace::default()
            }),
        }
    }

    pub fn put(&self, page: Page) {
        self.inner.lock().unwrap().pages.insert(page.id(), page);
    }

    pub fn delete(&self, id: PageId) {
        self.inner.lock().unwrap().pages.remove(&id);
    }

    pub fn list(&self, ids: Vec<PageId>) {
        self.inner.lock().unwrap().listed = ids;
    }

    pub fn fetched(&self) -> Vec<PageId> {
        self.inner.lock().unwrap().fetched.clone()
    }

    pub fn reset_fetched(&self) {
        self.inner.lock().unwrap().fetched.clear();
    }
}

#[async_trait]
impl RemoteSource for FakeNotion {
    async fn latest_versions(&self, ids: &[PageId]) -> Result<Vec<Option<RecordVersion>>, RemoteError> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .map(|id| {
                inner.pages.get(id).map(|page| RecordVersion {
                    id: *id,
                    version: page.version(),
                })
            })
            .collect())
    }

    async fn fetch_page(&self, id: PageId) -> Result<Page, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetched.push(id);
        inner
            .pages
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("no such page {id}").into())
    }

    async fn query_collection(
        &self,
        _collection_id: PageId,
        _view_id: PageId,
    ) -> Result<CollectionQuery, RemoteError> {
        let inner = self.inner.lock().unwrap();
        Ok(CollectionQuery {
            schema: inner.schema.clone(),
            block_ids: inner.listed.clone(),
        })
    }

    async fn collection_metadata(&self, _id: PageId) -> Result<CollectionMetadata, RemoteError> {
        Ok(CollectionMetadata {
            kind: BlockKind::CollectionViewPage,
            collection_id: Some(collection_id()),
            view_ids: vec![view_id()],
        })
    }
}
