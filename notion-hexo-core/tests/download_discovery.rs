mod common;

use std::collections::{HashMap, HashSet};

use mockall::predicate::eq;
use tempfile::tempdir;

use common::{id, PageBuilder};
use notion_hexo_core::cache::DirectoryCache;
use notion_hexo_core::contract::{MockRemoteSource, PageCache};
use notion_hexo_core::download::VersionAwareDownloader;
use notion_hexo_core::model::{Page, RecordVersion};
use notion_hexo_core::SyncError;

/// Remote that serves `pages`, expecting exactly `fetches` page downloads.
fn serving(pages: Vec<Page>, fetches: usize) -> MockRemoteSource {
    let pages: HashMap<_, _> = pages.into_iter().map(|p| (p.id(), p)).collect();
    let versions = pages.clone();
    let mut remote = MockRemoteSource::new();
    remote.expect_latest_versions().returning(move |ids| {
        Ok(ids
            .iter()
            .map(|id| {
                versions.get(id).map(|p| RecordVersion {
                    id: *id,
                    version: p.version(),
                })
            })
            .collect())
    });
    remote
        .expect_fetch_page()
        .times(fetches)
        .returning(move |id| pages.get(&id).cloned().ok_or_else(|| "gone".into()));
    remote
}

#[tokio::test]
async fn reuses_a_cached_page_that_is_not_stale() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let page = PageBuilder::new(id(1), "Cached").version(3).build();
    cache.write(&page).unwrap();

    let mut remote = MockRemoteSource::new();
    remote
        .expect_latest_versions()
        .times(1)
        .returning(|ids| Ok(vec![Some(RecordVersion { id: ids[0], version: 3 })]));
    remote.expect_fetch_page().times(0);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let pages = downloader.download_batch(&[id(1)]).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert!(!pages[0].updated);
    assert_eq!(pages[0].page, page);
}

#[tokio::test]
async fn refetches_and_overwrites_a_stale_page() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache
        .write(&PageBuilder::new(id(1), "Old").version(1).build())
        .unwrap();

    let fresh = PageBuilder::new(id(1), "New").version(2).build();
    let mut remote = MockRemoteSource::new();
    remote
        .expect_latest_versions()
        .returning(|ids| Ok(vec![Some(RecordVersion { id: ids[0], version: 2 })]));
    let served = fresh.clone();
    remote
        .expect_fetch_page()
        .with(eq(id(1)))
        .times(1)
        .returning(move |_| Ok(served.clone()));

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let pages = downloader.download_batch(&[id(1)]).await.unwrap();
    assert!(pages[0].updated);
    assert_eq!(cache.read(id(1)).unwrap(), Some(fresh));
}

#[tokio::test]
async fn missing_remote_record_counts_as_version_zero() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache.write(&PageBuilder::new(id(1), "Kept").build()).unwrap();

    let mut remote = MockRemoteSource::new();
    remote.expect_latest_versions().returning(|_| Ok(vec![None]));
    remote.expect_fetch_page().times(0);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let pages = downloader.download_batch(&[id(1)]).await.unwrap();
    assert!(!pages[0].updated);
}

#[tokio::test]
async fn empty_batch_makes_no_remote_call() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let mut remote = MockRemoteSource::new();
    remote.expect_latest_versions().times(0);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    assert!(downloader.download_batch(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn misaligned_version_response_is_fatal() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let mut remote = MockRemoteSource::new();
    remote
        .expect_latest_versions()
        .returning(|_| Ok(vec![Some(RecordVersion { id: id(9), version: 1 })]));
    remote.expect_fetch_page().times(0);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let err = downloader.download_batch(&[id(1)]).await.unwrap_err();
    assert!(matches!(err, SyncError::BatchMismatch(_)), "got {err:?}");
}

#[tokio::test]
async fn remote_failure_aborts_the_batch() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let mut remote = MockRemoteSource::new();
    remote
        .expect_latest_versions()
        .returning(|_| Err("unauthorized".into()));

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let err = downloader.download_batch(&[id(1)]).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote { .. }));
    assert!(cache.list_ids().unwrap().is_empty());
}

#[tokio::test]
async fn mutually_linked_pages_are_discovered_once() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let a = PageBuilder::new(id(1), "A").link(id(2), "B").build();
    let b = PageBuilder::new(id(2), "B").link(id(1), "A").build();
    let remote = serving(vec![a.clone(), b.clone()], 2);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let discovery = downloader.discover(&[id(1)]).await.unwrap();
    assert_eq!(discovery.reachable, vec![id(1), id(2)]);
    assert_eq!(discovery.updated, vec![id(1), id(2)]);

    // Same versions again: everything comes from the cache.
    let remote = serving(vec![a, b], 0);
    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let discovery = downloader.discover(&[id(1), id(1)]).await.unwrap();
    assert_eq!(discovery.reachable, vec![id(1), id(2)]);
    assert!(discovery.updated.is_empty());
}

#[tokio::test]
async fn discovery_reaches_nested_sub_pages() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let top = PageBuilder::new(id(1), "Top")
        .child(common::text(id(10), "intro"))
        .nested(common::block(
            id(2),
            notion_hexo_core::model::BlockKind::Page,
            serde_json::json!({ "title": [["Child"]] }),
        ))
        .build();
    let child = PageBuilder::new(id(2), "Child").link(id(3), "Grandchild").build();
    let grandchild = PageBuilder::new(id(3), "Grandchild").build();
    let remote = serving(vec![top, child, grandchild], 3);

    let downloader = VersionAwareDownloader::new(&remote, &cache);
    let discovery = downloader.discover(&[id(1)]).await.unwrap();
    assert_eq!(discovery.reachable, vec![id(1), id(2), id(3)]);
    assert_eq!(
        cache.list_ids().unwrap(),
        [id(1), id(2), id(3)].into_iter().collect::<HashSet<_>>()
    );
}
