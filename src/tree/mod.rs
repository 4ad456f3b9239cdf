//! Entry/Tree Model
//!
//! Paths, entries, the flat path-to-entry index, the walker that produces it
//! from a directory handle, and the fold that turns it into a display tree.

pub mod builder;
pub mod entry;
pub mod path;
pub mod walker;

pub use builder::TreeNode;
pub use entry::{Entry, EntryKind, FlatIndex};
pub use walker::{WalkStats, Walker, WalkerConfig};
