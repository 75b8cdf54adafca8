//! Rendered files under the Hexo source tree.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::SyncError;
use crate::fsutil::write_atomic;
use crate::id::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listed by a database; lands in `_posts`.
    Post,
    /// Nested below a post; lands in `pages`.
    Page,
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    posts_dir: PathBuf,
    pages_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(posts_dir: impl Into<PathBuf>, pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            pages_dir: pages_dir.into(),
        }
    }

    pub fn dir(&self, role: Role) -> &Path {
        match role {
            Role::Post => &self.posts_dir,
            Role::Page => &self.pages_dir,
        }
    }

    pub fn path_for(&self, id: PageId, role: Role) -> PathBuf {
        self.dir(role).join(format!("{}.md", id.no_dash()))
    }

    pub fn save(&self, id: PageId, role: Role, content: &[u8]) -> Result<PathBuf, SyncError> {
        let path = self.path_for(id, role);
        write_atomic(&path, content).map_err(|source| SyncError::Output {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Best effort; a missing file is not an error.
    pub fn remove(&self, id: PageId, role: Role) -> Option<PathBuf> {
        let path = self.path_for(id, role);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(page_id = %id, path = %path.display(), "Removed stale output");
                Some(path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(page_id = %id, path = %path.display(), error = %e, "Failed to remove stale output");
                None
            }
        }
    }
}
