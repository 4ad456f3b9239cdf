//! Integration tests for copy-then-delete mutations over generated trees

use handlefs::error::{HostError, MutationError, TransferPhase};
use handlefs::host::{DirRef, Handle, MemoryVolume};
use handlefs::mutation::{move_entry, rename_entry, MoveOutcome, RenameOutcome};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Files below `dir`, keyed by their path relative to it.
fn files_under(volume: &MemoryVolume, dir: &str) -> BTreeMap<String, Vec<u8>> {
    let prefix = format!("{}/", dir);
    volume
        .paths()
        .into_iter()
        .filter_map(|p| {
            let rel = p.strip_prefix(&prefix)?.to_string();
            volume.read(&p).map(|data| (rel, data.to_vec()))
        })
        .collect()
}

async fn child(dir: &DirRef, name: &str) -> Handle {
    dir.entries()
        .await
        .unwrap()
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, h)| h)
        .unwrap()
}

fn seed(files: &[(Vec<u8>, u8, Vec<u8>)]) -> MemoryVolume {
    let volume = MemoryVolume::new("gen");
    volume.mkdir_p("/src").unwrap();
    volume.mkdir_p("/dest").unwrap();
    for (dirs, file, contents) in files {
        let mut path = String::from("/src");
        for d in dirs {
            path.push_str(&format!("/d{}", d));
        }
        path.push_str(&format!("/f{}.txt", file));
        volume.write(&path, contents.clone()).unwrap();
    }
    volume
}

fn tree_strategy() -> impl Strategy<Value = Vec<(Vec<u8>, u8, Vec<u8>)>> {
    prop::collection::vec(
        (
            prop::collection::vec(0u8..3, 0..4),
            0u8..3,
            prop::collection::vec(any::<u8>(), 0..64),
        ),
        0..12,
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A move reproduces the subtree byte for byte and removes the original.
    #[test]
    fn prop_move_preserves_subtree(files in tree_strategy()) {
        let volume = seed(&files);
        let before = files_under(&volume, "/src");

        let (outcome, after) = runtime().block_on(async {
            let root = volume.root();
            let source = child(&root, "src").await;
            let target = root.get_directory("dest", false).await.unwrap();
            let outcome = move_entry(&source, &root, &target).await.unwrap();
            (outcome, files_under(&volume, "/dest/src"))
        });

        prop_assert!(!volume.exists("/src"));
        prop_assert_eq!(&after, &before);
        match outcome {
            MoveOutcome::Moved { transfer, .. } => {
                prop_assert_eq!(transfer.files, before.len());
                let bytes: u64 = before.values().map(|v| v.len() as u64).sum();
                prop_assert_eq!(transfer.bytes, bytes);
            }
            MoveOutcome::Skipped => prop_assert!(false, "move was skipped"),
        }
    }

    /// A rename keeps content and leaves nothing under the old name.
    #[test]
    fn prop_rename_preserves_subtree(files in tree_strategy()) {
        let volume = seed(&files);
        let before = files_under(&volume, "/src");

        let outcome = runtime().block_on(async {
            let root = volume.root();
            let source = child(&root, "src").await;
            rename_entry(&source, &root, "renamed").await.unwrap()
        });

        prop_assert!(matches!(outcome, RenameOutcome::Renamed { .. }), "expected RenameOutcome::Renamed, got {:?}", outcome);
        prop_assert!(!volume.exists("/src"));
        prop_assert!(volume.is_dir("/renamed"));
        prop_assert_eq!(files_under(&volume, "/renamed"), before);
    }

    /// Moving into the current parent touches nothing.
    #[test]
    fn prop_move_into_parent_is_noop(files in tree_strategy()) {
        let volume = seed(&files);
        let paths = volume.paths();
        let mutations = volume.mutation_count();

        let outcome = runtime().block_on(async {
            let root = volume.root();
            let source = child(&root, "src").await;
            move_entry(&source, &root, &volume.root()).await.unwrap()
        });

        prop_assert!(matches!(outcome, MoveOutcome::Skipped));
        prop_assert_eq!(volume.mutation_count(), mutations);
        prop_assert_eq!(volume.paths(), paths);
    }
}

/// Test that a copy failure keeps the original and reports partial progress
#[tokio::test]
async fn test_failed_copy_reports_partial_state() {
    let volume = MemoryVolume::new("partial");
    volume.write("/src/a.txt", "a").unwrap();
    volume.write("/src/zz/locked.txt", "z").unwrap();
    volume.mkdir_p("/dest").unwrap();
    volume.revoke("/src/zz").unwrap();

    let root = volume.root();
    let source = child(&root, "src").await;
    let target = root.get_directory("dest", false).await.unwrap();
    let err = move_entry(&source, &root, &target).await.unwrap_err();

    match &err {
        MutationError::Incomplete {
            phase,
            copied,
            source,
            ..
        } => {
            assert_eq!(*phase, TransferPhase::Copy);
            assert!(*copied > 0);
            assert!(matches!(source, HostError::PermissionDenied(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.left_partial_state());
    assert_eq!(volume.read("/src/a.txt").unwrap(), "a");
    assert!(volume.exists("/dest/src"));
}
