//! Property-based tests for folding walked indexes into trees

use handlefs::host::MemoryVolume;
use handlefs::tree::builder::TreeNode;
use handlefs::tree::walker::Walker;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn layout() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..4, 1..5), 0..16)
}

/// Directories are named `dN`, the last segment of each path is a file `fN`.
fn build(layout: &[Vec<u8>]) -> MemoryVolume {
    let volume = MemoryVolume::new("gen");
    for segments in layout {
        let (file, dirs) = segments.split_last().unwrap();
        let mut path = String::new();
        for d in dirs {
            path.push_str(&format!("/d{}", d));
        }
        path.push_str(&format!("/f{}", file));
        volume.write(&path, "x").unwrap();
    }
    volume
}

proptest! {
    /// The walked index and its folded tree hold the same entries.
    #[test]
    fn prop_fold_keeps_every_entry(layout in layout()) {
        let volume = build(&layout);
        let index = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(Walker::new(volume.root()).walk());

        prop_assert!(index.orphans().is_empty());
        prop_assert_eq!(index.len(), volume.paths().len() + 1);

        let tree = TreeNode::fold(&index).unwrap();
        let folded: BTreeSet<&str> = tree.flatten().iter().map(|e| e.path.as_str()).collect();
        let walked: BTreeSet<&str> = index.paths().collect();
        prop_assert_eq!(folded, walked);
    }

    /// Siblings in the tree list directories before files, each group by name.
    #[test]
    fn prop_fold_orders_siblings(layout in layout()) {
        let volume = build(&layout);
        let index = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(Walker::new(volume.root()).walk());
        let tree = TreeNode::fold(&index).unwrap();

        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            let keys: Vec<(bool, &str)> = node
                .children
                .iter()
                .map(|c| (!c.entry.is_directory(), c.entry.name.as_str()))
                .collect();
            let mut sorted = keys.clone();
            sorted.sort();
            prop_assert_eq!(keys, sorted);
            stack.extend(node.children.iter());
        }
    }
}
