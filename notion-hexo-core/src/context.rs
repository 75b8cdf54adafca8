//! State threaded through one synchronisation run.

use std::collections::HashSet;

use crate::download::Discovery;
use crate::front_matter::FrontMatter;
use crate::id::PageId;

/// One configured database view and the posts it currently lists.
#[derive(Debug, Clone)]
pub struct Database {
    pub page_id: PageId,
    pub view_id: PageId,
    pub collection_id: PageId,
    pub front_matter: FrontMatter,
    /// Posts in view order. Pruned by the publish filter.
    pub pages: Vec<PageId>,
}

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub databases: Vec<Database>,
    /// Closure of everything reachable from the listed posts, before filtering.
    pub discovery: Discovery,
    /// Pages whose cached copy changed this run, plus pages whose role did.
    pub updated: Vec<PageId>,
    /// Posts followed by their sub-pages; the render surface.
    pub all_pages: Vec<PageId>,
}

impl PipelineContext {
    pub fn new(databases: Vec<Database>) -> Self {
        Self {
            databases,
            discovery: Discovery::default(),
            updated: Vec::new(),
            all_pages: Vec::new(),
        }
    }

    /// Every post across databases, in configuration then view order.
    pub fn top_ids(&self) -> Vec<PageId> {
        self.databases
            .iter()
            .flat_map(|db| db.pages.iter().copied())
            .collect()
    }

    pub fn is_top(&self, id: &PageId) -> bool {
        self.databases.iter().any(|db| db.pages.contains(id))
    }

    /// Front matter mapping of the database listing `id` as a post.
    pub fn front_matter_for(&self, id: &PageId) -> Option<&FrontMatter> {
        self.databases
            .iter()
            .find(|db| db.pages.contains(id))
            .map(|db| &db.front_matter)
    }

    pub fn mark_updated(&mut self, id: PageId) {
        if !self.updated.contains(&id) {
            self.updated.push(id);
        }
    }

    /// Updated pages that are still on the render surface.
    pub fn render_targets(&self) -> Vec<PageId> {
        let updated: HashSet<_> = self.updated.iter().collect();
        self.all_pages
            .iter()
            .filter(|id| updated.contains(id))
            .copied()
            .collect()
    }
}
