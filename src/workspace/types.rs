//! Result types returned by the workspace facade.

use crate::mutation::Transfer;
use crate::store::RootRecord;
use crate::tree::entry::FlatIndex;
use crate::tree::walker::WalkStats;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of a path-addressed change.
#[derive(Debug)]
pub enum ChangeOutcome {
    /// A path the change needed was not in the current snapshot. Nothing was touched.
    Missing(String),
    /// The change was a no-op (same-name rename, move into the current parent).
    Unchanged(FlatIndex),
    /// The change was applied; `snapshot` is the re-walked index afterwards.
    Applied {
        snapshot: FlatIndex,
        transfer: Option<Transfer>,
    },
}

impl ChangeOutcome {
    pub fn snapshot(&self) -> Option<&FlatIndex> {
        match self {
            ChangeOutcome::Missing(_) => None,
            ChangeOutcome::Unchanged(snapshot) | ChangeOutcome::Applied { snapshot, .. } => {
                Some(snapshot)
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ChangeOutcome::Applied { .. })
    }
}

/// Summary of the granted root and its current contents
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub store_path: PathBuf,
    pub store_name: String,
    pub schema_version: u32,
    /// Records held by the store; 1 once a root is granted
    pub records: usize,
    pub root: Option<RootRecord>,
    /// Walk counters, absent when there is no root
    pub walk: Option<WalkStats>,
}
