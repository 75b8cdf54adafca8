mod common;

use std::collections::{BTreeMap, HashSet};

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use common::{id, PageBuilder};
use notion_hexo_core::cache::DirectoryCache;
use notion_hexo_core::contract::PageCache;
use notion_hexo_core::tree::{self, TreeSnapshot};

fn snapshot(top: &[u32], sub: &[(u32, Vec<u32>)]) -> TreeSnapshot {
    TreeSnapshot {
        top: top.iter().map(|n| id(*n)).collect(),
        sub: sub
            .iter()
            .map(|(t, subs)| (id(*t), subs.iter().map(|n| id(*n)).collect()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn dropped_post_and_dropped_sub_page_are_scheduled() {
    let (p1, p2, s1, s2) = (1, 2, 11, 12);
    let previous = snapshot(&[p1, p2], &[(p1, vec![s1, s2])]);
    let current = snapshot(&[p1], &[(p1, vec![s1])]);

    let diff = tree::diff(&previous, &current);
    assert_eq!(diff.removed_posts, vec![id(p2)]);
    assert_eq!(diff.removed_pages, vec![id(s2)]);
    assert!(diff.resurfaced.is_empty());
    assert!(diff.added.is_empty());
}

#[test]
fn a_removed_posts_sub_pages_go_with_it() {
    let previous = snapshot(&[1, 2], &[(2, vec![21, 22])]);
    let current = snapshot(&[1], &[]);

    let diff = tree::diff(&previous, &current);
    assert_eq!(diff.removed_posts, vec![id(2)]);
    assert_eq!(diff.removed_pages, vec![id(21), id(22)]);
}

#[test]
fn a_sub_page_still_under_another_post_is_protected() {
    // 30 used to hang off both posts; post 2 is gone but post 1 still has it.
    let previous = snapshot(&[1, 2], &[(1, vec![30]), (2, vec![30, 31])]);
    let current = snapshot(&[1], &[(1, vec![30])]);

    let diff = tree::diff(&previous, &current);
    assert_eq!(diff.removed_pages, vec![id(31)]);
}

#[test]
fn a_sub_page_promoted_to_post_loses_its_page_file() {
    // 12 stays linked from post 1 but is now also listed itself.
    let previous = snapshot(&[1], &[(1, vec![11, 12])]);
    let current = snapshot(&[1, 12], &[(1, vec![11, 12])]);

    let diff = tree::diff(&previous, &current);
    assert!(diff.removed_posts.is_empty());
    assert_eq!(diff.removed_pages, vec![id(12)]);
    assert_eq!(diff.added, vec![id(12)]);
    assert!(current.all_pages().contains(&id(12)));
}

#[test]
fn a_demoted_post_resurfaces_as_a_page() {
    let previous = snapshot(&[1, 2], &[]);
    let current = snapshot(&[1], &[(1, vec![2])]);

    let diff = tree::diff(&previous, &current);
    assert_eq!(diff.removed_posts, vec![id(2)]);
    assert_eq!(diff.resurfaced, vec![id(2)]);
    assert_eq!(diff.added, vec![id(2)]);
}

#[test]
fn first_generation_adds_everything() {
    let current = snapshot(&[1, 2], &[(1, vec![3])]);
    let diff = tree::diff(&TreeSnapshot::default(), &current);
    assert_eq!(diff.added, vec![id(1), id(2), id(3)]);
    assert!(diff.removed_posts.is_empty() && diff.removed_pages.is_empty());
}

#[test]
fn in_b_not_in_a_is_a_set_difference() {
    let a: Vec<_> = [1, 2, 3].map(id).to_vec();
    let b: Vec<_> = [4, 2, 5, 4, 1, 6].map(id).to_vec();
    let result = tree::in_b_not_in_a(&a, &b);
    assert_eq!(result, vec![id(4), id(5), id(6)]);

    let unique: HashSet<_> = result.iter().collect();
    assert_eq!(unique.len(), result.len());
    assert!(result.iter().all(|x| b.contains(x) && !a.contains(x)));
}

#[test]
fn snapshot_is_built_from_the_cache() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache
        .write(&PageBuilder::new(id(1), "Post").link(id(2), "Child").build())
        .unwrap();
    cache
        .write(&PageBuilder::new(id(2), "Child").link(id(3), "Grandchild").link(id(1), "Back").build())
        .unwrap();
    cache.write(&PageBuilder::new(id(3), "Grandchild").build()).unwrap();
    cache.write(&PageBuilder::new(id(4), "Lonely post").build()).unwrap();

    let built = TreeSnapshot::build(&[id(1), id(4)], &cache).unwrap();
    assert_eq!(built, snapshot(&[1, 4], &[(1, vec![2, 3])]));
    assert_eq!(built.all_pages(), vec![id(1), id(4), id(2), id(3)]);
}

#[test]
fn eviction_removes_only_unreachable_entries() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    for n in 1..=3 {
        cache.write(&PageBuilder::new(id(n), "Page").build()).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a page").unwrap();

    let reachable: HashSet<_> = [id(1), id(3)].into_iter().collect();
    let evicted = tree::evict_unreachable(&cache, &reachable).unwrap();
    assert_eq!(evicted, vec![id(2)]);
    assert_eq!(cache.list_ids().unwrap(), reachable);
    assert!(dir.path().join("notes.txt").exists());
}
