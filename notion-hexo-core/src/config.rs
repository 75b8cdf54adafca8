use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::{debug, info};

use crate::filter::PublishRule;
use crate::id::{InvalidId, PageId};

/// A database view to publish from, written `pageID+viewID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseRef {
    pub page_id: PageId,
    pub view_id: PageId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseRefError {
    #[error("database entry {0:?} must be written as pageID+viewID")]
    Shape(String),
    #[error("database entry {entry:?}: {source}")]
    Id {
        entry: String,
        #[source]
        source: InvalidId,
    },
}

impl FromStr for DatabaseRef {
    type Err = DatabaseRefError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let (page, view) = entry
            .trim()
            .split_once('+')
            .ok_or_else(|| DatabaseRefError::Shape(entry.to_string()))?;
        let parse = |raw: &str| {
            PageId::parse(raw.trim()).map_err(|source| DatabaseRefError::Id {
                entry: entry.to_string(),
                source,
            })
        };
        Ok(Self {
            page_id: parse(page)?,
            view_id: parse(view)?,
        })
    }
}

/// Where a run reads and writes, relative to the Hexo `source` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    pub notion_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl SyncPaths {
    pub fn for_source_dir(source_dir: &Path, cache_dir: Option<PathBuf>) -> Self {
        let notion_dir = source_dir.join("_notion");
        Self {
            cache_dir: cache_dir.unwrap_or_else(|| notion_dir.join("cache")),
            notion_dir,
            posts_dir: source_dir.join("_posts"),
            pages_dir: source_dir.join("pages"),
            images_dir: source_dir.join("images"),
        }
    }
}

/// Everything the pipeline needs to know, already validated.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub paths: SyncPaths,
    pub databases: Vec<DatabaseRef>,
    pub timezone: Tz,
    pub checkbox_syntax: bool,
    pub force_rerender: bool,
    /// `None` publishes every listed page.
    pub publish: Option<PublishRule>,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            notion_dir = %self.paths.notion_dir.display(),
            cache_dir = %self.paths.cache_dir.display(),
            databases = self.databases.len(),
            timezone = %self.timezone,
            force_rerender = self.force_rerender,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
