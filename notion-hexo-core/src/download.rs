//! Version-aware page downloading and sub-page discovery.
//!
//! [`VersionAwareDownloader::download_batch`] asks the remote for the current
//! version of every id in one call, then serves each page from the cache when
//! the cached copy is at least that new and refetches it otherwise.
//! [`VersionAwareDownloader::discover`] repeats that over a frontier of ids
//! until the closure of all reachable sub-pages has been resolved.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::contract::{PageCache, RemoteSource};
use crate::error::SyncError;
use crate::id::PageId;
use crate::model::{Page, RecordVersion};

/// A page resolved by the downloader.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub page: Page,
    /// True when the page was refetched from the remote in this run.
    pub updated: bool,
}

/// Result of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Every page resolved, seeds first, in discovery order.
    pub reachable: Vec<PageId>,
    /// The subset that was refetched.
    pub updated: Vec<PageId>,
}

impl Discovery {
    pub fn contains(&self, id: &PageId) -> bool {
        self.reachable.contains(id)
    }

    pub fn is_updated(&self, id: &PageId) -> bool {
        self.updated.contains(id)
    }
}

pub struct VersionAwareDownloader<'a, R: ?Sized, C: ?Sized> {
    remote: &'a R,
    cache: &'a C,
}

impl<'a, R, C> VersionAwareDownloader<'a, R, C>
where
    R: RemoteSource + ?Sized,
    C: PageCache + ?Sized,
{
    pub fn new(remote: &'a R, cache: &'a C) -> Self {
        Self { remote, cache }
    }

    /// Resolve one batch of pages, in request order.
    pub async fn download_batch(&self, ids: &[PageId]) -> Result<Vec<FetchedPage>, SyncError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let versions = self
            .remote
            .latest_versions(ids)
            .await
            .map_err(|e| SyncError::remote("looking up page versions", e))?;
        let latest = align_versions(ids, versions)?;

        let mut pages = Vec::with_capacity(ids.len());
        for (&id, latest) in ids.iter().zip(latest) {
            let cached = self.cache.read(id).map_err(|e| SyncError::cache(id, e))?;
            match cached {
                Some(page) if page.version() >= latest => {
                    debug!(page_id = %id, version = page.version(), "Cache hit");
                    pages.push(FetchedPage { page, updated: false });
                }
                cached => {
                    info!(
                        page_id = %id,
                        cached_version = cached.as_ref().map(Page::version),
                        latest,
                        "Downloading page"
                    );
                    let page = self
                        .remote
                        .fetch_page(id)
                        .await
                        .map_err(|e| SyncError::remote(format!("fetching page {id}"), e))?;
                    if page.id() != id {
                        return Err(SyncError::BatchMismatch(format!(
                            "requested page {id} but received {}",
                            page.id()
                        )));
                    }
                    self.cache.write(&page).map_err(|e| SyncError::cache(id, e))?;
                    pages.push(FetchedPage { page, updated: true });
                }
            }
        }
        Ok(pages)
    }

    /// Resolve `seeds` and everything reachable from them through sub-page
    /// links. Each page is resolved at most once, so link cycles terminate.
    pub async fn discover(&self, seeds: &[PageId]) -> Result<Discovery, SyncError> {
        let mut seen = HashSet::new();
        let mut frontier: Vec<PageId> = seeds.iter().copied().filter(|id| seen.insert(*id)).collect();
        let mut discovery = Discovery::default();

        while !frontier.is_empty() {
            let batch = std::mem::take(&mut frontier);
            debug!(batch = batch.len(), "Resolving discovery batch");
            for fetched in self.download_batch(&batch).await? {
                let id = fetched.page.id();
                discovery.reachable.push(id);
                if fetched.updated {
                    discovery.updated.push(id);
                }
                for sub in fetched.page.sub_page_ids() {
                    if seen.insert(sub) {
                        frontier.push(sub);
                    }
                }
            }
        }

        info!(
            reachable = discovery.reachable.len(),
            updated = discovery.updated.len(),
            "Discovery finished"
        );
        Ok(discovery)
    }
}

/// Pair each requested id with its remote version. Missing records count as
/// version 0; anything out of step with the request is fatal.
pub fn align_versions(
    ids: &[PageId],
    versions: Vec<Option<RecordVersion>>,
) -> Result<Vec<i64>, SyncError> {
    if versions.len() != ids.len() {
        return Err(SyncError::BatchMismatch(format!(
            "requested {} versions, received {}",
            ids.len(),
            versions.len()
        )));
    }
    ids.iter()
        .zip(versions)
        .map(|(id, record)| match record {
            None => Ok(0),
            Some(record) if record.id == *id => Ok(record.version),
            Some(record) => Err(SyncError::BatchMismatch(format!(
                "expected version of {id}, received {}",
                record.id
            ))),
        })
        .collect()
}
