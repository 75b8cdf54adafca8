//! Publish filter over collection pages.

use std::collections::HashSet;

use tracing::info;

use crate::cache;
use crate::context::PipelineContext;
use crate::contract::PageCache;
use crate::error::SyncError;
use crate::front_matter::FrontMatter;
use crate::id::PageId;
use crate::model::Block;

/// A post is published when the mapped `field` holds one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRule {
    pub field: String,
    pub values: Vec<String>,
}

impl Default for PublishRule {
    fn default() -> Self {
        Self {
            field: "status".to_string(),
            values: vec!["published".to_string()],
        }
    }
}

impl PublishRule {
    /// Collections without the field publish everything.
    pub fn accepts(&self, mapping: &FrontMatter, root: &Block) -> bool {
        if mapping.column(&self.field).is_none() {
            return true;
        }
        let Some(value) = mapping.literal(root, &self.field) else {
            return false;
        };
        let value = value.trim();
        self.values
            .iter()
            .any(|accepted| accepted.trim().eq_ignore_ascii_case(value))
    }
}

/// Drop unpublished posts from every database and from the updated set.
/// Returns the excluded ids.
pub fn filter_published<C: PageCache + ?Sized>(
    rule: &PublishRule,
    ctx: &mut PipelineContext,
    cache: &C,
) -> Result<Vec<PageId>, SyncError> {
    let mut excluded = Vec::new();
    for db in &mut ctx.databases {
        let mut kept = Vec::with_capacity(db.pages.len());
        for id in db.pages.drain(..) {
            let page = cache::require(cache, id)?;
            if rule.accepts(&db.front_matter, page.root()) {
                kept.push(id);
            } else {
                info!(page_id = %id, collection_id = %db.collection_id, "Skipping unpublished page");
                excluded.push(id);
            }
        }
        db.pages = kept;
    }
    let dropped: HashSet<_> = excluded.iter().collect();
    ctx.updated.retain(|id| !dropped.contains(id));
    Ok(excluded)
}
