//! Mutation primitives over directory and file handles.
//!
//! Hosts offer no native rename or move, so both are built as a full copy
//! followed by a recursive delete of the original. Nothing is rolled back: a
//! failure partway reports what was already copied through
//! [`MutationError::Incomplete`]. None of these functions touch the persisted
//! index; callers re-walk afterwards.

use crate::error::{HostError, MutationError, TransferPhase};
use crate::host::{DirRef, FileRef, Handle};
use crate::tree::entry::EntryKind;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// What a copy-then-delete transfer created at its destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub directories: usize,
    /// Files created, counted before their content is written.
    pub files: usize,
    pub bytes: u64,
}

impl Transfer {
    /// Directories plus files created
    pub fn items(&self) -> usize {
        self.directories + self.files
    }
}

#[derive(Debug)]
pub enum RenameOutcome {
    /// The new name equals the current one; nothing was touched.
    Unchanged,
    Renamed { handle: Handle, transfer: Transfer },
}

#[derive(Debug)]
pub enum MoveOutcome {
    /// Source already lives in the target directory; nothing was touched.
    Skipped,
    Moved { handle: Handle, transfer: Transfer },
}

/// Get-or-create a child of `parent`.
///
/// An existing child of the requested kind is returned as is, its content
/// untouched. An existing child of the other kind is a host error.
#[instrument(skip(parent), fields(parent = %parent.name()))]
pub async fn create_entry(
    parent: &DirRef,
    name: &str,
    kind: EntryKind,
) -> Result<Handle, MutationError> {
    let handle = match kind {
        EntryKind::Directory => Handle::Directory(parent.get_directory(name, true).await?),
        EntryKind::File => Handle::File(parent.get_file(name, true).await?),
    };
    debug!(name, %kind, "Entry created");
    Ok(handle)
}

/// Recursively remove the child `name` of `parent`.
#[instrument(skip(parent), fields(parent = %parent.name()))]
pub async fn remove_entry(parent: &DirRef, name: &str) -> Result<(), MutationError> {
    parent.remove_entry(name, true).await?;
    debug!(name, "Entry removed");
    Ok(())
}

/// Rename `source` within `source_parent` by copying it to `new_name` and
/// deleting the original.
///
/// The returned handle refers to the new entry; the old handle is stale.
#[instrument(skip(source, source_parent), fields(from = %source.name()))]
pub async fn rename_entry(
    source: &Handle,
    source_parent: &DirRef,
    new_name: &str,
) -> Result<RenameOutcome, MutationError> {
    if new_name == source.name() {
        debug!("Rename to the same name");
        return Ok(RenameOutcome::Unchanged);
    }

    let (handle, transfer) = transfer(source, source_parent, source_parent, new_name, "rename").await?;
    info!(
        to = new_name,
        files = transfer.files,
        directories = transfer.directories,
        bytes = transfer.bytes,
        "Entry renamed"
    );
    Ok(RenameOutcome::Renamed { handle, transfer })
}

/// Move `source` out of `source_parent` into `target`, keeping its name.
///
/// Moving into the directory the source already lives in is a no-op. The
/// check compares directory identity, so two distinct directories that share
/// a name are still treated as different. Moving a directory into its own
/// subtree is not detected here.
#[instrument(skip(source, source_parent, target), fields(name = %source.name(), target = %target.name()))]
pub async fn move_entry(
    source: &Handle,
    source_parent: &DirRef,
    target: &DirRef,
) -> Result<MoveOutcome, MutationError> {
    if source_parent.is_same_entry(target.as_ref()) {
        info!("Source is already in the target directory, skipping move");
        return Ok(MoveOutcome::Skipped);
    }

    let (handle, transfer) = transfer(source, source_parent, target, source.name(), "move").await?;
    info!(
        files = transfer.files,
        directories = transfer.directories,
        bytes = transfer.bytes,
        "Entry moved"
    );
    Ok(MoveOutcome::Moved { handle, transfer })
}

/// Copy `source` into `dest_parent` as `name`, then delete it from `source_parent`.
///
/// A destination the host resolves to the source itself, such as a case-only
/// rename on a case-insensitive filesystem, is refused before anything is
/// written.
async fn transfer(
    source: &Handle,
    source_parent: &DirRef,
    dest_parent: &DirRef,
    name: &str,
    operation: &'static str,
) -> Result<(Handle, Transfer), MutationError> {
    let mut progress = Transfer::default();

    let handle = match copy_handle(source, dest_parent, name, &mut progress).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(operation, copied = progress.items(), error = %e, "Copy failed, original left in place");
            return Err(MutationError::Incomplete {
                operation,
                name: source.name().to_string(),
                phase: TransferPhase::Copy,
                copied: progress.items(),
                source: e,
            });
        }
    };

    if let Err(e) = source_parent.remove_entry(source.name(), true).await {
        warn!(operation, error = %e, "Delete of original failed after complete copy");
        return Err(MutationError::Incomplete {
            operation,
            name: source.name().to_string(),
            phase: TransferPhase::Delete,
            copied: progress.items(),
            source: e,
        });
    }

    Ok((handle, progress))
}

async fn copy_handle(
    source: &Handle,
    dest_parent: &DirRef,
    name: &str,
    progress: &mut Transfer,
) -> Result<Handle, HostError> {
    match source {
        Handle::File(file) => {
            let copy = dest_parent.get_file(name, true).await?;
            ensure_distinct(source, &copy.resolved_identity().await?, name).await?;
            progress.files += 1;
            write_copy(file, &copy, progress).await?;
            Ok(Handle::File(copy))
        }
        Handle::Directory(dir) => {
            let copy = dest_parent.get_directory(name, true).await?;
            ensure_distinct(source, &copy.resolved_identity().await?, name).await?;
            progress.directories += 1;
            copy_tree(dir, &copy, progress).await?;
            Ok(Handle::Directory(copy))
        }
    }
}

async fn ensure_distinct(source: &Handle, dest_identity: &str, name: &str) -> Result<(), HostError> {
    if source.resolved_identity().await? == dest_identity {
        return Err(HostError::SameEntry(name.to_string()));
    }
    Ok(())
}

async fn copy_file(
    file: &FileRef,
    dest_parent: &DirRef,
    name: &str,
    progress: &mut Transfer,
) -> Result<(), HostError> {
    let copy = dest_parent.get_file(name, true).await?;
    progress.files += 1;
    write_copy(file, &copy, progress).await
}

async fn write_copy(file: &FileRef, copy: &FileRef, progress: &mut Transfer) -> Result<(), HostError> {
    let contents = file.read().await?;
    copy.write(&contents).await?;
    progress.bytes += contents.len() as u64;
    Ok(())
}

/// Recreate every child of `source` inside `dest`, depth first.
fn copy_tree<'a>(
    source: &'a DirRef,
    dest: &'a DirRef,
    progress: &'a mut Transfer,
) -> BoxFuture<'a, Result<(), HostError>> {
    async move {
        for (name, child) in source.entries().await? {
            match child {
                Handle::File(file) => {
                    copy_file(&file, dest, &name, progress).await?;
                }
                Handle::Directory(sub) => {
                    let sub_copy = dest.get_directory(&name, true).await?;
                    progress.directories += 1;
                    copy_tree(&sub, &sub_copy, progress).await?;
                }
            }
        }
        Ok(())
    }
    .boxed()
}
