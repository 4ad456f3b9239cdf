//! Integration tests for the persisted index

use handlefs::host::{HandleToken, MemoryHost};
use handlefs::store::{
    IndexLocation, IndexRecord, IndexStore, PersistedIndex, SledIndexStore, StoredRecord, ROOT_KEY,
};
use handlefs::tree::entry::EntryKind;
use handlefs::tree::walker::WalkerConfig;
use std::sync::Arc;
use tempfile::TempDir;

fn record(path: &str) -> IndexRecord {
    IndexRecord {
        path: path.to_string(),
        parent_path: "/".to_string(),
        name: path.trim_start_matches('/').to_string(),
        kind: EntryKind::File,
    }
}

/// Test that the stored root activates through the host after a reopen
#[tokio::test]
async fn test_root_pointer_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let location = IndexLocation::new(temp_dir.path().join("index"));
    let host = MemoryHost::new();
    let volume = host.volume("site");
    volume.write("/a.txt", "a").unwrap();

    let registered = PersistedIndex::new(location.clone())
        .register_root(&volume.root())
        .await
        .unwrap();
    assert_eq!(
        registered.token,
        HandleToken::Memory {
            volume: "site".to_string()
        }
    );

    let reopened = PersistedIndex::new(location);
    assert_eq!(reopened.get_root().await.unwrap(), Some(registered));
    let index = reopened
        .get_all_from_index(&host, &WalkerConfig::default())
        .await
        .unwrap();
    assert!(index.contains("/a.txt"));
}

/// Test that concurrent operations on one location are serialized
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_on_shared_location() {
    let temp_dir = TempDir::new().unwrap();
    let index = Arc::new(PersistedIndex::new(IndexLocation::new(
        temp_dir.path().join("index"),
    )));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let index = Arc::clone(&index);
            tokio::spawn(async move { index.put(record(&format!("/f{}", i))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let records = index.get_all().await.unwrap();
    assert_eq!(records.len(), 16);
}

/// Test that granting a new root drops every earlier record
#[tokio::test]
async fn test_regrant_clears_records() {
    let temp_dir = TempDir::new().unwrap();
    let index = PersistedIndex::new(IndexLocation::new(temp_dir.path().join("index")));
    let host = MemoryHost::new();

    index.put(record("/stale")).await.unwrap();
    index.register_root(&host.volume("one").root()).await.unwrap();
    index.register_root(&host.volume("two").root()).await.unwrap();

    let records = index.get_all().await.unwrap();
    assert_eq!(records.len(), 1);
    match &records[0] {
        StoredRecord::Root(root) => assert_eq!(root.name, "two"),
        other => panic!("unexpected record: {:?}", other),
    }
    assert_eq!(records[0].key(), ROOT_KEY);
}

/// Test that a removed volume surfaces as an activation error
#[tokio::test]
async fn test_revoked_grant() {
    let temp_dir = TempDir::new().unwrap();
    let index = PersistedIndex::new(IndexLocation::new(temp_dir.path().join("index")));
    let host = MemoryHost::new();
    index.register_root(&host.volume("gone").root()).await.unwrap();
    host.remove_volume("gone");

    let result = index
        .get_all_from_index(&host, &WalkerConfig::default())
        .await;
    assert!(result.is_err());
}

/// Test that separately named collections in one database do not mix
#[test]
fn test_named_collections_are_separate() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");

    let mut first = IndexLocation::new(&path);
    first.store_name = "first".to_string();
    let mut second = IndexLocation::new(&path);
    second.store_name = "second".to_string();

    {
        let store = SledIndexStore::open(&first).unwrap();
        store.put(&record("/only-in-first")).unwrap();
        store.flush().unwrap();
    }

    let store = SledIndexStore::open(&second).unwrap();
    assert!(store.get_all().unwrap().is_empty());
}
