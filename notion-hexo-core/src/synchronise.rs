//! High-level pipeline: one incremental Notion → Hexo synchronisation run.
//!
//! [`synchronise`] drives every stage in order and threads a
//! [`PipelineContext`] through them:
//!   - Resolve each configured database view to its schema and listed posts
//!   - Discover the full closure of sub-pages, refetching only stale pages
//!   - Drop unpublished posts
//!   - Diff this generation's tree against the previous one; remove output
//!     files that lost their page, evict unreachable cache entries
//!   - Build the URL map, render every changed page, wait for its images and
//!     write it out
//!   - Persist the converter version
//!
//! # Error Handling
//! The first fatal error aborts the run and is returned as a [`SyncError`].
//! Recoverable problems (an unreadable snapshot, a stale file that cannot be
//! removed) are logged where they happen.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache;
use crate::config::SyncConfig;
use crate::context::{Database, PipelineContext};
use crate::contract::{AssetFetcher, PageCache, RemoteSource};
use crate::download::VersionAwareDownloader;
use crate::error::SyncError;
use crate::filter;
use crate::front_matter::FrontMatter;
use crate::id::PageId;
use crate::images::ImageDownloader;
use crate::markdown::{self, RenderOptions};
use crate::model::BlockKind;
use crate::output::{OutputWriter, Role};
use crate::property::plain_text;
use crate::state::{ConverterState, StateStore};
use crate::tree::{self, TreeSnapshot};
use crate::url::UrlResolver;

/// Public prefix of the images directory on the generated site.
pub const IMAGES_URL_PREFIX: &str = "/images";

/// What a run did.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Pages reachable from the listed posts, before filtering.
    pub discovered: usize,
    /// Pages refetched from the remote.
    pub downloaded: usize,
    /// Posts dropped by the publish filter.
    pub excluded: Vec<PageId>,
    pub rendered: Vec<RenderedPage>,
    pub removed_files: Vec<PathBuf>,
    pub evicted: Vec<PageId>,
    pub images: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub id: PageId,
    pub role: Role,
    pub path: PathBuf,
}

pub async fn synchronise<R, C>(
    config: &SyncConfig,
    remote: &R,
    cache: &C,
    assets: Arc<dyn AssetFetcher>,
) -> Result<SyncReport, SyncError>
where
    R: RemoteSource + ?Sized,
    C: PageCache + ?Sized,
{
    info!("[SYNC] Starting synchronisation");
    let mut report = SyncReport::default();

    let databases = load_databases(config, remote).await?;
    let mut ctx = PipelineContext::new(databases);

    let downloader = VersionAwareDownloader::new(remote, cache);
    ctx.discovery = downloader.discover(&ctx.top_ids()).await?;
    ctx.updated = ctx.discovery.updated.clone();
    report.discovered = ctx.discovery.reachable.len();
    report.downloaded = ctx.discovery.updated.len();

    if let Some(rule) = &config.publish {
        report.excluded = filter::filter_published(rule, &mut ctx, cache)?;
    }

    let store = StateStore::new(&config.paths.notion_dir);
    let previous = store.load_snapshot();
    let current = TreeSnapshot::build(&ctx.top_ids(), cache)?;
    let diff = tree::diff(&previous, &current);
    for id in diff.resurfaced.iter().chain(&diff.added) {
        ctx.mark_updated(*id);
    }
    ctx.all_pages = current.all_pages();
    if let Err(e) = store.save_snapshot(&current) {
        warn!(error = %e, "[SYNC] Failed to persist tree snapshot");
    }

    let writer = OutputWriter::new(&config.paths.posts_dir, &config.paths.pages_dir);
    let removals = diff
        .removed_posts
        .iter()
        .map(|id| (*id, Role::Post))
        .chain(diff.removed_pages.iter().map(|id| (*id, Role::Page)));
    for (id, role) in removals {
        report.removed_files.extend(writer.remove(id, role));
    }

    let reachable: HashSet<PageId> = ctx.discovery.reachable.iter().copied().collect();
    report.evicted = tree::evict_unreachable(cache, &reachable)?;

    let resolver = build_resolver(&ctx, cache)?;

    let converter = store.load_converter();
    let targets = if config.force_rerender || converter.is_outdated() {
        info!(
            force = config.force_rerender,
            stored_version = converter.converter_version,
            "[SYNC] Rerendering every page"
        );
        ctx.all_pages.clone()
    } else {
        ctx.render_targets()
    };

    let options = RenderOptions {
        checkbox_syntax: config.checkbox_syntax,
        timezone: config.timezone,
    };
    let images = ImageDownloader::new(assets, &config.paths.images_dir, IMAGES_URL_PREFIX);
    for id in targets {
        let page = cache::require(cache, id)?;
        let role = if ctx.is_top(&id) { Role::Post } else { Role::Page };
        let mut batch = images.batch();
        let rendered = markdown::render_page(
            &page,
            &resolver,
            ctx.front_matter_for(&id),
            &options,
            &mut batch,
        );
        match batch.wait().await {
            Ok(saved) => report.images += saved,
            Err(e) => {
                error!(page_id = %id, error = %e, "[SYNC][ERROR] Image download failed");
                return Err(e.into());
            }
        }
        let path = writer.save(id, role, rendered.as_bytes())?;
        info!(page_id = %id, role = ?role, path = %path.display(), "[SYNC] Rendered page");
        report.rendered.push(RenderedPage { id, role, path });
    }

    if let Err(e) = store.save_converter(&ConverterState::current()) {
        warn!(error = %e, "[SYNC] Failed to persist converter state");
    }

    info!(
        discovered = report.discovered,
        downloaded = report.downloaded,
        rendered = report.rendered.len(),
        removed = report.removed_files.len(),
        evicted = report.evicted.len(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}

/// Resolve every configured view to its collection, schema and posts.
pub async fn load_databases<R: RemoteSource + ?Sized>(
    config: &SyncConfig,
    remote: &R,
) -> Result<Vec<Database>, SyncError> {
    let mut databases = Vec::with_capacity(config.databases.len());
    let mut listed = HashSet::new();
    for entry in &config.databases {
        let meta = remote
            .collection_metadata(entry.page_id)
            .await
            .map_err(|e| SyncError::remote(format!("reading database {}", entry.page_id), e))?;
        let not_a_collection = || SyncError::NotACollection {
            page_id: entry.page_id,
            kind: meta.kind.as_str().to_string(),
        };
        if !matches!(meta.kind, BlockKind::CollectionView | BlockKind::CollectionViewPage) {
            return Err(not_a_collection());
        }
        let collection_id = meta.collection_id.ok_or_else(not_a_collection)?;
        if !meta.view_ids.contains(&entry.view_id) {
            return Err(SyncError::UnknownView {
                page_id: entry.page_id,
                view_id: entry.view_id,
            });
        }

        let query = remote
            .query_collection(collection_id, entry.view_id)
            .await
            .map_err(|e| SyncError::remote(format!("querying collection {collection_id}"), e))?;
        let front_matter = FrontMatter::new(&query.schema)?;
        let pages = query
            .block_ids
            .into_iter()
            .filter(|id| {
                let first = listed.insert(*id);
                if !first {
                    warn!(page_id = %id, collection_id = %collection_id, "Page already listed by another database, ignoring");
                }
                first
            })
            .collect::<Vec<_>>();
        info!(
            collection_id = %collection_id,
            view_id = %entry.view_id,
            pages = pages.len(),
            "Loaded database"
        );
        databases.push(Database {
            page_id: entry.page_id,
            view_id: entry.view_id,
            collection_id,
            front_matter,
            pages,
        });
    }
    Ok(databases)
}

/// Canonical URL and title of every page on the render surface.
pub fn build_resolver<C: PageCache + ?Sized>(
    ctx: &PipelineContext,
    cache: &C,
) -> Result<UrlResolver, SyncError> {
    let mut resolver = UrlResolver::new(ctx.top_ids());
    for &id in &ctx.all_pages {
        let page = cache::require(cache, id)?;
        let url = resolver.canonical_url(page.root(), ctx.front_matter_for(&id));
        let title = plain_text(&page.root().title()).trim().to_string();
        resolver.insert(id, url, title);
    }
    Ok(resolver)
}
