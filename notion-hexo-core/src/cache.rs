//! On-disk page cache.
//!
//! One JSON file per page, named `<no-dash id>.json`, directly under the cache
//! root. Writes go through a temp file in the same directory, are fsynced and
//! then renamed over the old entry, so a reader never sees a torn page.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::contract::PageCache;
use crate::error::SyncError;
use crate::fsutil::write_atomic;
use crate::id::PageId;
use crate::model::Page;

const EXTENSION: &str = "json";

pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: PageId) -> PathBuf {
        self.root.join(format!("{}.{}", id.no_dash(), EXTENSION))
    }
}

impl PageCache for DirectoryCache {
    fn read(&self, id: PageId) -> io::Result<Option<Page>> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice::<Page>(&bytes) {
            Ok(page) => Ok(Some(page)),
            Err(e) => {
                // A corrupt entry is just a miss; the page gets refetched.
                warn!(page_id = %id, path = %path.display(), error = %e, "Discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    fn write(&self, page: &Page) -> io::Result<()> {
        let path = self.path_for(page.id());
        let bytes = serde_json::to_vec(page).map_err(io::Error::other)?;
        write_atomic(&path, &bytes)?;
        debug!(page_id = %page.id(), path = %path.display(), "Cached page");
        Ok(())
    }

    fn remove(&self, id: PageId) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn list_ids(&self) -> io::Result<HashSet<PageId>> {
        let mut ids = HashSet::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match PageId::parse(stem) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => debug!(path = %path.display(), "Skipping foreign file in cache dir"),
            }
        }
        Ok(ids)
    }
}

/// Read a page that must be cached because discovery already resolved it.
pub fn require<C: PageCache + ?Sized>(cache: &C, id: PageId) -> Result<Page, SyncError> {
    cache
        .read(id)
        .map_err(|e| SyncError::cache(id, e))?
        .ok_or(SyncError::NotCached(id))
}
