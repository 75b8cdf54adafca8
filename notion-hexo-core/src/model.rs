//! Pages, blocks and collection schemas as fetched from Notion.
//!
//! Blocks deserialize straight from Notion's record JSON. A [`Page`] is the
//! set of blocks loaded for one page id; it is cached and replaced as a whole.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{BlockId, PageId};
use crate::property::{self, InlineSpan};

/// Block type tag. Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    Page,
    Text,
    Image,
    Code,
    Todo,
    Gist,
    Video,
    Callout,
    Header,
    SubHeader,
    SubSubHeader,
    BulletedList,
    NumberedList,
    Toggle,
    Quote,
    Divider,
    Bookmark,
    CollectionView,
    CollectionViewPage,
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Page => "page",
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Code => "code",
            BlockKind::Todo => "to_do",
            BlockKind::Gist => "gist",
            BlockKind::Video => "video",
            BlockKind::Callout => "callout",
            BlockKind::Header => "header",
            BlockKind::SubHeader => "sub_header",
            BlockKind::SubSubHeader => "sub_sub_header",
            BlockKind::BulletedList => "bulleted_list",
            BlockKind::NumberedList => "numbered_list",
            BlockKind::Toggle => "toggle",
            BlockKind::Quote => "quote",
            BlockKind::Divider => "divider",
            BlockKind::Bookmark => "bookmark",
            BlockKind::CollectionView => "collection_view",
            BlockKind::CollectionViewPage => "collection_view_page",
            BlockKind::Other(tag) => tag,
        }
    }
}

impl From<String> for BlockKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "page" => BlockKind::Page,
            "text" => BlockKind::Text,
            "image" => BlockKind::Image,
            "code" => BlockKind::Code,
            "to_do" => BlockKind::Todo,
            "gist" => BlockKind::Gist,
            "video" => BlockKind::Video,
            "callout" => BlockKind::Callout,
            "header" => BlockKind::Header,
            "sub_header" => BlockKind::SubHeader,
            "sub_sub_header" => BlockKind::SubSubHeader,
            "bulleted_list" => BlockKind::BulletedList,
            "numbered_list" => BlockKind::NumberedList,
            "toggle" => BlockKind::Toggle,
            "quote" => BlockKind::Quote,
            "divider" => BlockKind::Divider,
            "bookmark" => BlockKind::Bookmark,
            "collection_view" => BlockKind::CollectionView,
            "collection_view_page" => BlockKind::CollectionViewPage,
            _ => BlockKind::Other(tag),
        }
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One Notion block record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Column id (or well-known key such as `title`) to rich-text value.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default)]
    pub content: Vec<BlockId>,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub last_edited_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<PageId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub view_ids: Vec<PageId>,
}

impl Block {
    /// Rich text stored under `key`; empty when absent or malformed.
    pub fn spans(&self, key: &str) -> Vec<InlineSpan> {
        match self.properties.get(key) {
            Some(value) => property::rich_text(value).unwrap_or_else(|e| {
                tracing::warn!(block_id = %self.id, key, error = %e, "Ignoring malformed rich text");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// First literal of the property under `key`, if any.
    pub fn literal(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .and_then(|value| property::first_literal(value).ok())
    }

    pub fn title(&self) -> Vec<InlineSpan> {
        self.spans("title")
    }

    pub fn caption(&self) -> Vec<InlineSpan> {
        self.spans("caption")
    }

    pub fn is_checked(&self) -> bool {
        self.literal("checked").as_deref() == Some("Yes")
    }

    pub fn language(&self) -> String {
        self.literal("language").unwrap_or_default()
    }

    /// Source URL of media and embed blocks.
    pub fn source(&self) -> String {
        let display = self
            .format
            .as_ref()
            .and_then(|f| f.get("display_source"))
            .and_then(Value::as_str);
        match (self.literal("source"), display) {
            (Some(source), _) if !source.is_empty() => source,
            (_, Some(display)) => display.to_string(),
            _ => String::new(),
        }
    }
}

/// Serialized shape of a cached page.
#[derive(Serialize, Deserialize)]
struct PageRecord {
    id: PageId,
    blocks: Vec<Block>,
}

#[derive(Debug, thiserror::Error)]
#[error("page {0} does not contain its own root block")]
pub struct MissingRoot(pub PageId);

/// All blocks loaded for one page, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PageRecord", into = "PageRecord")]
pub struct Page {
    id: PageId,
    blocks: BTreeMap<BlockId, Block>,
}

impl TryFrom<PageRecord> for Page {
    type Error = MissingRoot;

    fn try_from(record: PageRecord) -> Result<Self, Self::Error> {
        Page::new(record.id, record.blocks)
    }
}

impl From<Page> for PageRecord {
    fn from(page: Page) -> Self {
        PageRecord {
            id: page.id,
            blocks: page.blocks.into_values().collect(),
        }
    }
}

impl Page {
    pub fn new(id: PageId, blocks: impl IntoIterator<Item = Block>) -> Result<Self, MissingRoot> {
        let blocks: BTreeMap<_, _> = blocks.into_iter().map(|b| (b.id, b)).collect();
        if !blocks.contains_key(&id) {
            return Err(MissingRoot(id));
        }
        Ok(Self { id, blocks })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn root(&self) -> &Block {
        // Page::new guarantees presence.
        &self.blocks[&self.id]
    }

    /// Version of the root block; what staleness checks compare against.
    pub fn version(&self) -> i64 {
        self.root().version
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn is_root(&self, block: &Block) -> bool {
        block.id == self.id
    }

    /// Children of `block` that were loaded with this page, in order.
    pub fn children<'a>(&'a self, block: &'a Block) -> impl Iterator<Item = &'a Block> + 'a {
        block.content.iter().filter_map(move |id| self.blocks.get(id))
    }

    /// Pages linked directly from this page's block tree. Sub-pages are not
    /// descended into.
    pub fn sub_page_ids(&self) -> Vec<PageId> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&Block> = VecDeque::from([self.root()]);
        seen.insert(self.id);
        while let Some(block) = queue.pop_front() {
            for child in self.children(block) {
                if !seen.insert(child.id) {
                    continue;
                }
                if child.kind == BlockKind::Page {
                    found.push(child.id);
                } else {
                    queue.push_back(child);
                }
            }
        }
        found
    }
}

/// Semantic type of a collection column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    Title,
    Text,
    Number,
    Select,
    MultiSelect,
    Checkbox,
    Date,
    CreatedTime,
    LastEditedTime,
    Other(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::Title => "title",
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Select => "select",
            ColumnType::MultiSelect => "multi_select",
            ColumnType::Checkbox => "checkbox",
            ColumnType::Date => "date",
            ColumnType::CreatedTime => "created_time",
            ColumnType::LastEditedTime => "last_edited_time",
            ColumnType::Other(tag) => tag,
        }
    }
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "title" => ColumnType::Title,
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "select" => ColumnType::Select,
            "multi_select" => ColumnType::MultiSelect,
            "checkbox" => ColumnType::Checkbox,
            "date" => ColumnType::Date,
            "created_time" => ColumnType::CreatedTime,
            "last_edited_time" => ColumnType::LastEditedTime,
            _ => ColumnType::Other(tag),
        }
    }
}

impl From<ColumnType> for String {
    fn from(kind: ColumnType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema column as declared in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

/// Result of querying a collection view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionQuery {
    pub schema: Vec<SchemaColumn>,
    /// Pages directly contained in the view, in view order.
    pub block_ids: Vec<PageId>,
}

/// What a database page id points at.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMetadata {
    pub kind: BlockKind,
    pub collection_id: Option<PageId>,
    pub view_ids: Vec<PageId>,
}

/// Authoritative version of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordVersion {
    pub id: PageId,
    pub version: i64,
}
