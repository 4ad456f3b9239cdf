//! Integration tests for walk completeness against the real filesystem

use handlefs::host::{DirRef, LocalDirectory};
use handlefs::tree::entry::EntryKind;
use handlefs::tree::walker::{Walker, WalkerConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

fn build_fixture(root: &Path) {
    fs::create_dir_all(root.join("a/b/c/d")).unwrap();
    fs::create_dir_all(root.join("a/empty")).unwrap();
    fs::create_dir_all(root.join("z")).unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();
    fs::write(root.join("a/one.js"), "1").unwrap();
    fs::write(root.join("a/b/two.css"), "2").unwrap();
    fs::write(root.join("a/b/c/three.html"), "3").unwrap();
    fs::write(root.join("a/b/c/d/four"), "4").unwrap();
    fs::write(root.join("z/.hidden"), "h").unwrap();
}

/// Every path walkdir sees, as slash-separated paths relative to `root`.
fn oracle(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let joined = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            format!("/{}", joined)
        })
        .collect()
}

fn local_root(path: &Path) -> DirRef {
    Arc::new(LocalDirectory::open(path).unwrap())
}

/// Test that the walk finds exactly what the filesystem holds
#[tokio::test]
async fn test_walk_matches_filesystem() {
    let temp_dir = TempDir::new().unwrap();
    build_fixture(temp_dir.path());

    let index = Walker::new(local_root(temp_dir.path())).walk().await;

    let walked: BTreeSet<String> = index.paths().map(str::to_string).collect();
    assert_eq!(walked, oracle(temp_dir.path()));
}

/// Test that kinds agree with the filesystem
#[tokio::test]
async fn test_walk_kinds_match_filesystem() {
    let temp_dir = TempDir::new().unwrap();
    build_fixture(temp_dir.path());

    let index = Walker::new(local_root(temp_dir.path())).walk().await;

    for entry in index.iter().filter(|e| !e.is_root()) {
        let on_disk = temp_dir.path().join(entry.path.trim_start_matches('/'));
        let expected = if on_disk.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        assert_eq!(entry.kind, expected, "kind mismatch for {}", entry.path);
    }
}

/// Test that every non-root entry has its parent in the index
#[tokio::test]
async fn test_walk_has_no_orphans() {
    let temp_dir = TempDir::new().unwrap();
    build_fixture(temp_dir.path());

    let index = Walker::new(local_root(temp_dir.path())).walk().await;

    assert!(index.orphans().is_empty());
    let deepest = index.get("/a/b/c/d/four").unwrap();
    assert_eq!(deepest.parent_path, "/a/b/c/d");
    assert_eq!(deepest.name, "four");
}

/// Test that stats count what was found
#[tokio::test]
async fn test_walk_stats() {
    let temp_dir = TempDir::new().unwrap();
    build_fixture(temp_dir.path());

    let (index, stats) = Walker::new(local_root(temp_dir.path()))
        .walk_with_stats()
        .await;

    assert_eq!(stats.files, index.files().count());
    assert_eq!(stats.files, 6);
    // root, a, a/b, a/b/c, a/b/c/d, a/empty, z
    assert_eq!(stats.directories, 7);
    assert_eq!(stats.failed_branches, 0);
}

/// Test that ignore patterns and depth limits prune the walk
#[tokio::test]
async fn test_walk_config_prunes() {
    let temp_dir = TempDir::new().unwrap();
    build_fixture(temp_dir.path());

    let config = WalkerConfig {
        ignore_patterns: vec!["b".to_string()],
        max_depth: None,
    };
    let index = Walker::with_config(local_root(temp_dir.path()), config)
        .walk()
        .await;
    assert!(index.contains("/a"));
    assert!(!index.contains("/a/b"));
    assert!(!index.contains("/a/b/c/three.html"));

    let config = WalkerConfig {
        ignore_patterns: Vec::new(),
        max_depth: Some(2),
    };
    let index = Walker::with_config(local_root(temp_dir.path()), config)
        .walk()
        .await;
    assert!(index.contains("/a/b"));
    assert!(index.contains("/a/one.js"));
    assert!(!index.contains("/a/b/two.css"));
}
