//! # contract: seams between the pipeline and the outside world
//!
//! The pipeline never talks HTTP or touches a cache directory directly. It goes
//! through three traits:
//!
//! - [`RemoteSource`]: the Notion workspace (versions, pages, collections).
//! - [`AssetFetcher`]: authenticated download of private image bytes.
//! - [`PageCache`]: durable id→page storage between runs.
//!
//! All three are annotated for `mockall` so tests can script remote behaviour
//! without a network. Remote collaborators report failures as boxed errors;
//! every such failure is fatal to the run.

use std::collections::HashSet;

use async_trait::async_trait;
use mockall::automock;

use crate::id::PageId;
use crate::model::{CollectionMetadata, CollectionQuery, Page, RecordVersion};

/// Error type for remote collaborators.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Read access to the remote workspace.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Current versions for `ids`, aligned positionally with the request.
    /// A record that is missing or not visible is `None`.
    async fn latest_versions(&self, ids: &[PageId]) -> Result<Vec<Option<RecordVersion>>, RemoteError>;

    /// The full block tree of one page.
    async fn fetch_page(&self, id: PageId) -> Result<Page, RemoteError>;

    /// Schema and directly contained pages of a collection view.
    async fn query_collection(
        &self,
        collection_id: PageId,
        view_id: PageId,
    ) -> Result<CollectionQuery, RemoteError>;

    /// Resolve a database page id to its collection and views.
    async fn collection_metadata(&self, id: PageId) -> Result<CollectionMetadata, RemoteError>;
}

/// Downloads private assets referenced from pages.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Durable page storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PageCache: Send + Sync {
    fn read(&self, id: PageId) -> std::io::Result<Option<Page>>;

    /// Must be durable once it returns.
    fn write(&self, page: &Page) -> std::io::Result<()>;

    fn remove(&self, id: PageId) -> std::io::Result<()>;

    fn list_ids(&self) -> std::io::Result<HashSet<PageId>>;
}
