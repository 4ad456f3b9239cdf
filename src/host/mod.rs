//! Host Filesystem Capabilities
//!
//! A handle is an opaque capability granted by the host environment: a
//! directory handle can enumerate and create/remove children, a file handle can
//! read and overwrite its content. Handles know their own name but not their
//! absolute path; paths are synthesized by the walker.
//!
//! Handles never cross a context boundary by reference. A directory handle
//! produces a serializable [`HandleToken`] that a [`Host`] re-activates later.

pub mod local;
pub mod memory;
pub mod picker;

pub use local::{LocalDirectory, LocalFile, LocalHost};
pub use memory::{MemoryHost, MemoryVolume};
pub use picker::{ConsolePicker, DirectoryPicker, FixedPicker, PickerGuard};

use crate::error::HostError;
use crate::tree::entry::EntryKind;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared directory capability
pub type DirRef = Arc<dyn DirectoryHandle>;

/// Shared file capability
pub type FileRef = Arc<dyn FileHandle>;

/// Directory capability: enumeration and child management.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// Name of this directory as the host reports it.
    fn name(&self) -> &str;

    /// Stable identity used to decide whether two handles refer to the same directory.
    fn identity(&self) -> String;

    /// Durable token from which the host can re-activate this directory.
    fn token(&self) -> HandleToken;

    /// Enumerate immediate children in host order.
    async fn entries(&self) -> Result<Vec<(String, Handle)>, HostError>;

    /// Get a child directory, creating it when `create` is set and it is missing.
    async fn get_directory(&self, name: &str, create: bool) -> Result<DirRef, HostError>;

    /// Get a child file, creating an empty one when `create` is set and it is missing.
    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef, HostError>;

    /// Remove a child. Non-empty directories require `recursive`.
    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<(), HostError>;

    fn is_same_entry(&self, other: &dyn DirectoryHandle) -> bool {
        self.identity() == other.identity()
    }

    /// Identity of the object the host resolves this handle to.
    ///
    /// Unlike [`DirectoryHandle::identity`] this sees through aliases, such as
    /// a differently cased name on a case-insensitive filesystem.
    async fn resolved_identity(&self) -> Result<String, HostError> {
        Ok(self.identity())
    }
}

/// File capability: whole-content read and overwrite.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    fn identity(&self) -> String;

    /// Declared media type of the file, if the host knows one.
    fn content_type(&self) -> Option<String>;

    async fn read(&self) -> Result<Bytes, HostError>;

    /// Replace the whole content of the file.
    async fn write(&self, contents: &[u8]) -> Result<(), HostError>;

    async fn resolved_identity(&self) -> Result<String, HostError> {
        Ok(self.identity())
    }
}

/// A directory or file capability.
#[derive(Clone)]
pub enum Handle {
    Directory(DirRef),
    File(FileRef),
}

impl Handle {
    pub fn name(&self) -> &str {
        match self {
            Handle::Directory(dir) => dir.name(),
            Handle::File(file) => file.name(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Handle::Directory(_) => EntryKind::Directory,
            Handle::File(_) => EntryKind::File,
        }
    }

    pub fn identity(&self) -> String {
        match self {
            Handle::Directory(dir) => dir.identity(),
            Handle::File(file) => file.identity(),
        }
    }

    pub async fn resolved_identity(&self) -> Result<String, HostError> {
        match self {
            Handle::Directory(dir) => dir.resolved_identity().await,
            Handle::File(file) => file.resolved_identity().await,
        }
    }

    pub fn as_directory(&self) -> Option<&DirRef> {
        match self {
            Handle::Directory(dir) => Some(dir),
            Handle::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            Handle::File(file) => Some(file),
            Handle::Directory(_) => None,
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Directory(dir) => f
                .debug_struct("Directory")
                .field("name", &dir.name())
                .field("identity", &dir.identity())
                .finish(),
            Handle::File(file) => f
                .debug_struct("File")
                .field("name", &file.name())
                .field("identity", &file.identity())
                .finish(),
        }
    }
}

/// Serializable pointer to a directory capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleToken {
    /// A directory on the local disk, by canonical absolute path.
    Local { path: PathBuf },
    /// The root of a named in-memory volume.
    Memory { volume: String },
}

impl fmt::Display for HandleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleToken::Local { path } => write!(f, "local:{}", path.display()),
            HandleToken::Memory { volume } => write!(f, "memory:{}", volume),
        }
    }
}

/// Host environment that re-activates durable tokens into live handles.
///
/// Activation is where the host applies its permission rules: a token whose
/// target is gone or no longer accessible fails here.
#[async_trait]
pub trait Host: Send + Sync {
    async fn activate(&self, token: &HandleToken) -> Result<DirRef, HostError>;
}

/// Reject names the host would refuse: empty, `.`/`..`, or containing separators or NUL.
pub(crate) fn validate_name(name: &str) -> Result<(), HostError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(HostError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Media type a host declares for a file name, derived from its extension.
///
/// Unknown extensions have no declared type.
pub fn declared_content_type(name: &str) -> Option<&'static str> {
    let ext = crate::tree::path::extension(name).to_ascii_lowercase();
    let media = match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "map" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/vnd.microsoft.icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(media)
}
