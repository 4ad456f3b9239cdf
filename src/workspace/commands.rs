//! Workspace facade over the persisted index, the host and the mutation primitives.
//!
//! Every path-addressed operation looks its handles up in a fresh walk of the
//! granted root, calls one mutation primitive, and walks again so the caller
//! always sees the tree as it is after the change.

use super::types::{ChangeOutcome, WorkspaceStatus};
use crate::error::{ApiError, HostError};
use crate::host::{DirRef, DirectoryPicker, Host, PickerGuard};
use crate::mutation::{self, MoveOutcome, RenameOutcome};
use crate::store::{IndexLocation, PersistedIndex, RootRecord};
use crate::tree::builder::TreeNode;
use crate::tree::entry::{Entry, EntryKind, FlatIndex};
use crate::tree::path;
use crate::tree::walker::WalkerConfig;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct Workspace {
    host: Arc<dyn Host>,
    index: PersistedIndex,
    walker: WalkerConfig,
    picker_guard: PickerGuard,
}

impl Workspace {
    pub fn new(host: Arc<dyn Host>, location: IndexLocation) -> Self {
        Self {
            host,
            index: PersistedIndex::new(location),
            walker: WalkerConfig::default(),
            picker_guard: PickerGuard::new(),
        }
    }

    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    pub fn index(&self) -> &PersistedIndex {
        &self.index
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Ask `picker` for a root directory and register it.
    ///
    /// Returns `Ok(None)` when the user cancels; the stored root is then left
    /// as it was. A second grant while one is waiting on the picker fails with
    /// [`HostError::PickerBusy`].
    pub async fn grant(&self, picker: &dyn DirectoryPicker) -> Result<Option<RootRecord>, ApiError> {
        match self.picker_guard.pick(picker).await? {
            Some(dir) => Ok(Some(self.grant_handle(&dir).await?)),
            None => {
                info!("Directory selection cancelled");
                Ok(None)
            }
        }
    }

    /// Register `dir` as the root, replacing any previous grant.
    pub async fn grant_handle(&self, dir: &DirRef) -> Result<RootRecord, ApiError> {
        Ok(self.index.register_root(dir).await?)
    }

    /// Fresh flat index of the granted root. Empty when nothing is granted.
    pub async fn snapshot(&self) -> Result<FlatIndex, ApiError> {
        Ok(self
            .index
            .get_all_from_index(self.host.as_ref(), &self.walker)
            .await?)
    }

    /// Fresh display tree of the granted root.
    pub async fn tree(&self) -> Result<Option<TreeNode>, ApiError> {
        Ok(TreeNode::fold(&self.snapshot().await?))
    }

    pub async fn status(&self) -> Result<WorkspaceStatus, ApiError> {
        let schema_version = self.index.open_store().await?;
        let records = self.index.get_all().await?.len();
        let root = self.index.get_root().await?;
        let walk = self
            .index
            .walk_from_root(self.host.as_ref(), &self.walker)
            .await?
            .map(|(_, stats)| stats);

        let location = self.index.location();
        Ok(WorkspaceStatus {
            store_path: location.path.clone(),
            store_name: location.store_name.clone(),
            schema_version,
            records,
            root,
            walk,
        })
    }

    /// Walk the granted root, failing with [`ApiError::NoRoot`] when there is none.
    async fn require_snapshot(&self) -> Result<FlatIndex, ApiError> {
        self.index
            .walk_from_root(self.host.as_ref(), &self.walker)
            .await?
            .map(|(index, _)| index)
            .ok_or(ApiError::NoRoot)
    }

    /// Get-or-create `name` inside the directory at `parent_path`.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        parent_path: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let Some(parent) = directory_at(&snapshot, parent_path)? else {
            return Ok(missing(parent_path));
        };
        mutation::create_entry(&parent, name, kind).await?;
        self.applied(None).await
    }

    /// Like [`Workspace::create`], but refuses to reuse an existing entry.
    #[instrument(skip(self))]
    pub async fn create_new(
        &self,
        parent_path: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let Some(parent) = directory_at(&snapshot, parent_path)? else {
            return Ok(missing(parent_path));
        };
        let target = path::join(parent_path, name);
        if snapshot.contains(&target) {
            return Err(ApiError::AlreadyExists(target));
        }
        mutation::create_entry(&parent, name, kind).await?;
        self.applied(None).await
    }

    /// Recursively remove the entry at `entry_path`.
    #[instrument(skip(self))]
    pub async fn remove(&self, entry_path: &str) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let Some((entry, parent)) = entry_with_parent(&snapshot, entry_path)? else {
            return Ok(missing(entry_path));
        };
        mutation::remove_entry(&parent, &entry.name).await?;
        self.applied(None).await
    }

    /// Give the entry at `entry_path` a new name in the same directory.
    #[instrument(skip(self))]
    pub async fn rename(&self, entry_path: &str, new_name: &str) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let Some((entry, parent)) = entry_with_parent(&snapshot, entry_path)? else {
            return Ok(missing(entry_path));
        };
        if new_name != entry.name {
            let target = path::join(&entry.parent_path, new_name);
            if target != entry.path && snapshot.contains(&target) {
                return Err(ApiError::AlreadyExists(target));
            }
        }

        match mutation::rename_entry(&entry.handle, &parent, new_name).await? {
            RenameOutcome::Unchanged => Ok(ChangeOutcome::Unchanged(snapshot)),
            RenameOutcome::Renamed { transfer, .. } => self.applied(Some(transfer)).await,
        }
    }

    /// Move the entry at `entry_path` into the directory at `target_path`.
    #[instrument(skip(self))]
    pub async fn move_to(&self, entry_path: &str, target_path: &str) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let Some((entry, parent)) = entry_with_parent(&snapshot, entry_path)? else {
            return Ok(missing(entry_path));
        };
        let Some(target) = directory_at(&snapshot, target_path)? else {
            return Ok(missing(target_path));
        };

        let target_path = path::normalize_path(target_path);
        if entry.is_directory()
            && (target_path == entry.path || path::is_descendant(&entry.path, &target_path))
        {
            return Err(ApiError::MoveIntoDescendant {
                from: entry.path.clone(),
                into: target_path,
            });
        }
        if target_path != entry.parent_path {
            let destination = path::join(&target_path, &entry.name);
            if snapshot.contains(&destination) {
                return Err(ApiError::AlreadyExists(destination));
            }
        }

        match mutation::move_entry(&entry.handle, &parent, &target).await? {
            MoveOutcome::Skipped => Ok(ChangeOutcome::Unchanged(snapshot)),
            MoveOutcome::Moved { transfer, .. } => self.applied(Some(transfer)).await,
        }
    }

    /// Full content of the file at `file_path`.
    pub async fn read_file(&self, file_path: &str) -> Result<Bytes, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let entry = snapshot
            .lookup(file_path)
            .ok_or_else(|| ApiError::PathNotFound(file_path.to_string()))?;
        let file = entry
            .handle
            .as_file()
            .ok_or_else(|| HostError::NotAFile(entry.path.clone()))?;
        Ok(file.read().await?)
    }

    /// Replace the content of the file at `file_path`, creating it when its
    /// parent directory exists.
    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    pub async fn write_file(&self, file_path: &str, contents: &[u8]) -> Result<ChangeOutcome, ApiError> {
        let snapshot = self.require_snapshot().await?;
        let name = path::basename(file_path).to_string();
        let file_path = path::normalize_path(file_path);

        let file = match snapshot.get(&file_path) {
            Some(entry) => entry
                .handle
                .as_file()
                .cloned()
                .ok_or_else(|| HostError::NotAFile(entry.path.clone()))?,
            None => {
                let parent_path = path::parent_path(&file_path);
                let Some(parent) = directory_at(&snapshot, &parent_path)? else {
                    return Ok(missing(&parent_path));
                };
                parent.get_file(&name, true).await?
            }
        };
        file.write(contents).await?;
        self.applied(None).await
    }

    async fn applied(&self, transfer: Option<crate::mutation::Transfer>) -> Result<ChangeOutcome, ApiError> {
        Ok(ChangeOutcome::Applied {
            snapshot: self.snapshot().await?,
            transfer,
        })
    }
}

fn missing(entry_path: &str) -> ChangeOutcome {
    warn!(path = entry_path, "Path not in workspace, nothing changed");
    ChangeOutcome::Missing(entry_path.to_string())
}

/// Directory handle at `dir_path`, `None` when the path is absent.
fn directory_at(snapshot: &FlatIndex, dir_path: &str) -> Result<Option<DirRef>, ApiError> {
    match snapshot.lookup(dir_path) {
        Some(entry) => entry
            .handle
            .as_directory()
            .cloned()
            .map(Some)
            .ok_or_else(|| HostError::NotADirectory(entry.path.clone()).into()),
        None => Ok(None),
    }
}

/// Entry at `entry_path` together with its parent directory handle.
///
/// The root has no parent and is reported as absent.
fn entry_with_parent(
    snapshot: &FlatIndex,
    entry_path: &str,
) -> Result<Option<(Entry, DirRef)>, ApiError> {
    let Some(entry) = snapshot.lookup(entry_path) else {
        return Ok(None);
    };
    if entry.is_root() {
        warn!("The granted root cannot be changed through its own path");
        return Ok(None);
    }
    Ok(directory_at(snapshot, &entry.parent_path)?.map(|parent| (entry.clone(), parent)))
}
