//! Generation snapshots of the published tree and what changed between them.
//!
//! A [`TreeSnapshot`] records which posts were published and, per post, the
//! pages nested below it. Comparing the previous run's snapshot with the
//! current one tells which output files no longer have a page behind them.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache;
use crate::contract::PageCache;
use crate::error::SyncError;
use crate::id::PageId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    #[serde(default)]
    pub top: Vec<PageId>,
    #[serde(default)]
    pub sub: BTreeMap<PageId, Vec<PageId>>,
}

impl TreeSnapshot {
    /// Snapshot of `top` with sub-page sets recomputed from the cache.
    pub fn build<C: PageCache + ?Sized>(top: &[PageId], cache: &C) -> Result<Self, SyncError> {
        let mut snapshot = TreeSnapshot {
            top: dedup(top.iter().copied()),
            sub: BTreeMap::new(),
        };
        for &id in &snapshot.top {
            let subs = collect_sub_pages(cache, id)?;
            if !subs.is_empty() {
                snapshot.sub.insert(id, subs);
            }
        }
        Ok(snapshot)
    }

    /// Union of every post's sub-pages, in post order.
    pub fn sub_pages(&self) -> Vec<PageId> {
        dedup(
            self.top
                .iter()
                .filter_map(|id| self.sub.get(id))
                .flatten()
                .copied(),
        )
    }

    /// Sub-pages that render as pages: those not also listed as posts.
    pub fn page_role(&self) -> Vec<PageId> {
        let top: HashSet<_> = self.top.iter().collect();
        self.sub_pages()
            .into_iter()
            .filter(|id| !top.contains(id))
            .collect()
    }

    /// Posts followed by sub-pages, without duplicates.
    pub fn all_pages(&self) -> Vec<PageId> {
        dedup(self.top.iter().copied().chain(self.sub_pages()))
    }
}

/// Deletions and role changes between two generations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDiff {
    /// Posts no longer listed; their post files go.
    pub removed_posts: Vec<PageId>,
    /// Pages no longer rendered in the page role, either because no post
    /// reaches them or because they are now posts; their page files go.
    pub removed_pages: Vec<PageId>,
    /// Removed posts that are still reachable as a sub-page.
    pub resurfaced: Vec<PageId>,
    /// Pages that are new to their role in this generation.
    pub added: Vec<PageId>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.removed_posts.is_empty() && self.removed_pages.is_empty() && self.added.is_empty()
    }
}

pub fn diff(previous: &TreeSnapshot, current: &TreeSnapshot) -> TreeDiff {
    let previous_subs = previous.page_role();
    let current_subs = current.page_role();

    let removed_posts = in_b_not_in_a(&current.top, &previous.top);
    let removed_pages = in_b_not_in_a(&current_subs, &previous_subs);
    let current_sub_set: HashSet<_> = current_subs.iter().collect();
    let resurfaced = removed_posts
        .iter()
        .filter(|id| current_sub_set.contains(id))
        .copied()
        .collect();
    let added = dedup(
        in_b_not_in_a(&previous.top, &current.top)
            .into_iter()
            .chain(in_b_not_in_a(&previous_subs, &current_subs)),
    );

    TreeDiff {
        removed_posts,
        removed_pages,
        resurfaced,
        added,
    }
}

/// Elements of `b` absent from `a`, without duplicates, in `b`'s order.
pub fn in_b_not_in_a(a: &[PageId], b: &[PageId]) -> Vec<PageId> {
    let a: HashSet<_> = a.iter().collect();
    let mut seen = HashSet::new();
    b.iter()
        .filter(|id| !a.contains(id) && seen.insert(**id))
        .copied()
        .collect()
}

fn dedup(ids: impl IntoIterator<Item = PageId>) -> Vec<PageId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Every page transitively nested below `top`, breadth first. `top` itself
/// is excluded even when a cycle leads back to it.
pub fn collect_sub_pages<C: PageCache + ?Sized>(
    cache: &C,
    top: PageId,
) -> Result<Vec<PageId>, SyncError> {
    let mut found = Vec::new();
    let mut seen = HashSet::from([top]);
    let mut queue = VecDeque::from([top]);
    while let Some(id) = queue.pop_front() {
        let page = cache::require(cache, id)?;
        for sub in page.sub_page_ids() {
            if seen.insert(sub) {
                found.push(sub);
                queue.push_back(sub);
            }
        }
    }
    Ok(found)
}

/// Remove cache entries for pages outside `reachable`.
pub fn evict_unreachable<C: PageCache + ?Sized>(
    cache: &C,
    reachable: &HashSet<PageId>,
) -> Result<Vec<PageId>, SyncError> {
    let stored = cache
        .list_ids()
        .map_err(|e| SyncError::cache("<listing>", e))?;
    let mut evicted: Vec<PageId> = stored.into_iter().filter(|id| !reachable.contains(id)).collect();
    evicted.sort();
    evicted.retain(|id| match cache.remove(*id) {
        Ok(()) => {
            info!(page_id = %id, "Evicted unreachable page from cache");
            true
        }
        Err(e) => {
            warn!(page_id = %id, error = %e, "Failed to evict cache entry");
            false
        }
    });
    Ok(evicted)
}
