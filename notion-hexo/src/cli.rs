//! # notion-hexo CLI
//!
//! Command parsing and orchestration. The pipeline itself lives in
//! `notion-hexo-core`; this module locates the Hexo site, loads its config,
//! wires the Notion client and the page cache together and reports the run.
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notion_hexo_core::cache::DirectoryCache;
use notion_hexo_core::config::SyncPaths;
use notion_hexo_core::synchronise::synchronise;
use tracing::info;

use crate::load_config::load_config;
use crate::notion::NotionClient;

/// Publish Notion database pages into a Hexo site.
#[derive(Parser)]
#[clap(
    name = "notion-hexo",
    version,
    about = "Incrementally synchronise Notion databases into Hexo markdown"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download changed pages and rewrite the affected markdown files
    Sync {
        /// Hexo site root; must contain a `source/` directory
        #[clap(long, default_value = ".")]
        root: PathBuf,
        /// Page cache directory (default: source/_notion/cache)
        #[clap(long)]
        cache: Option<PathBuf>,
        /// Rerender every page even when nothing changed
        #[clap(long)]
        force: bool,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync { root, cache, force } => sync(root, cache, force).await,
    }
}

async fn sync(root: PathBuf, cache: Option<PathBuf>, force: bool) -> Result<()> {
    let source_dir = root.join("source");
    if !source_dir.is_dir() {
        bail!(
            "{} does not look like a Hexo site: missing source/ directory",
            root.display()
        );
    }
    let paths = SyncPaths::for_source_dir(&source_dir, cache);
    fs::create_dir_all(&paths.notion_dir)
        .with_context(|| format!("Failed to create {}", paths.notion_dir.display()))?;

    let settings = load_config(paths.notion_dir.join("config.yml"))?
        .into_settings(paths, force)?;
    settings.sync.trace_loaded();
    info!(command = "sync", "Starting synchronisation process");

    let client = Arc::new(
        NotionClient::new(
            settings.token_v2.clone(),
            settings.timeout,
            settings.sync.timezone.name(),
        )
        .context("Failed to build HTTP client")?,
    );
    let cache = DirectoryCache::open(&settings.sync.paths.cache_dir).with_context(|| {
        format!(
            "Failed to open page cache {}",
            settings.sync.paths.cache_dir.display()
        )
    })?;

    let report = synchronise(&settings.sync, client.as_ref(), &cache, client.clone())
        .await
        .context("Synchronisation failed")?;

    info!(
        discovered = report.discovered,
        downloaded = report.downloaded,
        excluded = report.excluded.len(),
        rendered = report.rendered.len(),
        removed = report.removed_files.len(),
        evicted = report.evicted.len(),
        images = report.images,
        "Synchronisation report"
    );
    Ok(())
}
