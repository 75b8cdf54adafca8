//! Canonical URLs of published pages and rewriting of workspace links.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::front_matter::FrontMatter;
use crate::id::{InvalidId, PageId};
use crate::model::Block;

/// Where pages outside the published set are linked to.
pub const REMOTE_BASE: &str = "https://notion.so/";

const WORKSPACE_PREFIXES: [&str; 2] = ["https://notion.so/", "https://www.notion.so/"];

#[derive(Debug, Clone, Default)]
pub struct UrlResolver {
    top_level: HashSet<PageId>,
    urls: HashMap<PageId, String>,
    titles: HashMap<PageId, String>,
}

impl UrlResolver {
    pub fn new(top_level: impl IntoIterator<Item = PageId>) -> Self {
        Self {
            top_level: top_level.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_top_level(&self, id: &PageId) -> bool {
        self.top_level.contains(id)
    }

    pub fn is_published(&self, id: &PageId) -> bool {
        self.urls.contains_key(id)
    }

    /// Record a published page.
    pub fn insert(&mut self, id: PageId, url: String, title: String) {
        self.urls.insert(id, url);
        self.titles.insert(id, title);
    }

    pub fn title(&self, id: &PageId) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }

    /// `/<id>` for posts, `/pages/<id>.html` for everything else.
    pub fn default_url(&self, id: PageId) -> String {
        if self.is_top_level(&id) {
            format!("/{}", id.no_dash())
        } else {
            format!("/pages/{}.html", id.no_dash())
        }
    }

    /// The user-declared URL of a post if it has one, else the default.
    pub fn canonical_url(&self, root: &Block, mapping: Option<&FrontMatter>) -> String {
        mapping
            .filter(|_| self.is_top_level(&root.id))
            .and_then(|mapping| mapping.declared_url(root))
            .unwrap_or_else(|| self.default_url(root.id))
    }

    pub fn remote_url(id: PageId) -> String {
        format!("{REMOTE_BASE}{}", id.no_dash())
    }

    /// Canonical URL of a published page, or its remote address.
    pub fn resolve(&self, raw: &str) -> Result<String, InvalidId> {
        let id = PageId::parse(raw)?;
        Ok(self.url_of(id))
    }

    pub fn url_of(&self, id: PageId) -> String {
        match self.urls.get(&id) {
            Some(url) => url.clone(),
            None => Self::remote_url(id),
        }
    }

    /// Markup for a link block pointing at another page.
    pub fn page_link(&self, id: PageId, title: &str) -> String {
        if self.is_top_level(&id) && self.is_published(&id) {
            format!("{{% post_link {} %}}", id.no_dash())
        } else {
            format!("[{}]({})", title, self.url_of(id))
        }
    }

    /// Point workspace URLs at the published copy of the page they name.
    /// Anything else is returned unchanged.
    pub fn rewrite(&self, url: &str) -> String {
        let Some(rest) = WORKSPACE_PREFIXES.iter().find_map(|p| url.strip_prefix(p)) else {
            return url.to_string();
        };
        let path = rest.split(['?', '#']).next().unwrap_or_default();
        let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        let raw = segment.rsplit('-').next().unwrap_or(segment);
        match self.resolve(raw) {
            Ok(resolved) => {
                debug!(from = url, to = %resolved, "Rewrote workspace link");
                resolved
            }
            Err(_) => url.to_string(),
        }
    }
}
