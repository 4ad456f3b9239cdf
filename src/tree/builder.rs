//! Tree builder: folds a flat index into a display tree and back

use crate::tree::entry::{Entry, FlatIndex};
use std::collections::HashMap;
use tracing::debug;

/// An entry plus its ordered children.
///
/// Derived from a [`FlatIndex`] and never persisted. Children are ordered
/// directories first, then by name.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub entry: Entry,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Fold a flat index into a tree rooted at `"/"`.
    ///
    /// Returns `None` when the index has no root. Entries not reachable from
    /// the root are left out.
    pub fn fold(index: &FlatIndex) -> Option<TreeNode> {
        let root = index.root()?;

        let mut by_parent: HashMap<&str, Vec<&Entry>> = HashMap::new();
        for entry in index.iter().filter(|e| !e.is_root()) {
            by_parent
                .entry(entry.parent_path.as_str())
                .or_default()
                .push(entry);
        }

        let tree = Self::assemble(root, &by_parent);
        let reachable = tree.len();
        if reachable != index.len() {
            debug!(
                unreachable = index.len() - reachable,
                "Entries left out of tree"
            );
        }
        Some(tree)
    }

    fn assemble(entry: &Entry, by_parent: &HashMap<&str, Vec<&Entry>>) -> TreeNode {
        let mut children: Vec<TreeNode> = if entry.is_directory() {
            by_parent
                .get(entry.path.as_str())
                .map(|kids| {
                    kids.iter()
                        .map(|child| Self::assemble(child, by_parent))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        children.sort_by(|a, b| {
            b.entry
                .is_directory()
                .cmp(&a.entry.is_directory())
                .then_with(|| a.entry.name.cmp(&b.entry.name))
        });

        TreeNode {
            entry: entry.clone(),
            children,
        }
    }

    /// Depth-first, pre-order list of every entry in the tree.
    pub fn flatten(&self) -> Vec<&Entry> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Entry>) {
        out.push(&self.entry);
        for child in &self.children {
            child.collect(out);
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Find the node at `path` in this subtree.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        self.ancestry(path).and_then(|chain| chain.last().copied())
    }

    /// Chain of nodes from this node down to the node at `path`, inclusive.
    pub fn ancestry(&self, path: &str) -> Option<Vec<&TreeNode>> {
        if self.entry.path == path {
            return Some(vec![self]);
        }
        for child in &self.children {
            let is_on_path = child.entry.path == path
                || crate::tree::path::is_descendant(&child.entry.path, path);
            if is_on_path {
                let mut chain = child.ancestry(path)?;
                chain.insert(0, self);
                return Some(chain);
            }
        }
        None
    }
}
