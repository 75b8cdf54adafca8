//! Offloading of private Notion images.
//!
//! Images uploaded to Notion live in a signed S3 bucket and stop resolving
//! once the signature expires, so they are copied next to the site. A
//! [`ImageBatch`] is scoped to one page render: [`ImageBatch::resolve`]
//! returns the local path immediately and the bytes are fetched in the
//! background; [`ImageBatch::wait`] joins every fetch before the page is
//! written.

use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Url;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::contract::AssetFetcher;
use crate::error::ImageError;
use crate::model::Block;

const PRIVATE_HOST_SUFFIX: &str = "amazonaws.com";
const PRIVATE_PATH_PREFIX: &str = "/secure.notion-static.com";

/// Bytes escaped in a link path segment. Parentheses would end a markdown
/// link target.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'(')
    .add(b')');

/// Decoded path below the images root for a private asset, or `None` for
/// anything that can be linked directly.
pub fn private_asset_path(source: &str) -> Option<String> {
    let url = Url::parse(source).ok()?;
    if !url.host_str()?.ends_with(PRIVATE_HOST_SUFFIX) {
        return None;
    }
    let rest = url.path().strip_prefix(PRIVATE_PATH_PREFIX)?;
    let rest = percent_decode_str(rest.trim_start_matches('/'))
        .decode_utf8()
        .ok()?;
    if rest.is_empty() || rest.split(['/', '\\']).any(|part| part == "..") {
        return None;
    }
    Some(rest.into_owned())
}

/// Site address of a file stored at `rest` below the images root.
fn public_link(prefix: &str, rest: &str) -> String {
    let encoded: Vec<String> = rest
        .split('/')
        .map(|segment| utf8_percent_encode(segment, LINK_SEGMENT).to_string())
        .collect();
    format!("{}/{}", prefix.trim_end_matches('/'), encoded.join("/"))
}

#[derive(Clone)]
pub struct ImageDownloader {
    fetcher: Arc<dyn AssetFetcher>,
    images_dir: PathBuf,
    public_prefix: String,
}

impl ImageDownloader {
    /// `images_dir` is where files land; `public_prefix` is how the site
    /// addresses that directory (`/images`).
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        images_dir: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            images_dir: images_dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    /// Start a batch for one page.
    pub fn batch(&self) -> ImageBatch {
        ImageBatch {
            downloader: self.clone(),
            tasks: JoinSet::new(),
        }
    }
}

pub struct ImageBatch {
    downloader: ImageDownloader,
    tasks: JoinSet<Result<PathBuf, ImageError>>,
}

impl ImageBatch {
    /// Address to emit for `source`. Private assets are scheduled for
    /// download and rewritten to their local path.
    pub fn resolve(&mut self, source: &str, block: &Block) -> String {
        let Some(rest) = private_asset_path(source) else {
            return source.to_string();
        };
        let target = self.downloader.images_dir.join(&rest);
        let fetcher = Arc::clone(&self.downloader.fetcher);
        let url = source.to_string();
        debug!(block_id = %block.id, url = %url, path = %target.display(), "Scheduling image download");
        self.tasks.spawn(async move {
            let bytes = fetcher
                .fetch(&url)
                .await
                .map_err(|source| ImageError::Fetch { url: url.clone(), source })?;
            let write = async {
                if let Some(dir) = target.parent() {
                    tokio::fs::create_dir_all(dir).await?;
                }
                tokio::fs::write(&target, &bytes).await
            };
            write.await.map_err(|source| ImageError::Write {
                url,
                path: target.clone(),
                source,
            })?;
            Ok(target)
        });
        public_link(&self.downloader.public_prefix, &rest)
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Join every scheduled download. The first failure is returned and the
    /// remaining downloads are aborted.
    pub async fn wait(mut self) -> Result<usize, ImageError> {
        let mut saved = 0;
        while let Some(joined) = self.tasks.join_next().await {
            let path = joined??;
            info!(path = %path.display(), "Saved image");
            saved += 1;
        }
        Ok(saved)
    }
}
