//! Error types for the handlefs workspace mirror.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a host filesystem capability (a directory or file handle).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Destination {0:?} is the source entry itself")]
    SameEntry(String),

    #[error("A directory picker is already open")]
    PickerBusy,

    #[error("Handle token is not recognised by this host: {0}")]
    UnknownToken(String),

    #[error("Host I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable index errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open index store at {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Index store operation failed: {0}")]
    Backend(String),

    #[error("Failed to encode or decode index record: {0}")]
    Codec(String),

    #[error("Index store schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Key {0:?} is reserved for the root pointer")]
    ReservedKey(String),

    #[error("Index store task failed: {0}")]
    Task(String),

    #[error("Root handle could not be activated: {0}")]
    Host(#[from] HostError),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Stage of a copy-then-delete transfer at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Copying the source to its destination. The original is untouched but the
    /// destination may hold a partial copy.
    Copy,
    /// Deleting the original after a complete copy. Both the copy and (some of)
    /// the original may exist.
    Delete,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Copy => write!(f, "copy"),
            TransferPhase::Delete => write!(f, "delete"),
        }
    }
}

/// Errors from the mutation primitives.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Host(#[from] HostError),

    /// A rename or move stopped partway. Nothing is rolled back.
    #[error("{operation} of {name:?} stopped during {phase} after copying {copied} item(s): {source}")]
    Incomplete {
        operation: &'static str,
        name: String,
        phase: TransferPhase,
        copied: usize,
        source: HostError,
    },
}

impl MutationError {
    /// True when the failure may have left both the original and a partial copy behind.
    pub fn left_partial_state(&self) -> bool {
        match self {
            MutationError::Host(_) => false,
            MutationError::Incomplete { phase, copied, .. } => {
                *phase == TransferPhase::Delete || *copied > 0
            }
        }
    }
}

/// Workspace facade and CLI errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Host error: {0}")]
    HostError(#[from] HostError),

    #[error("Mutation failed: {0}")]
    MutationError(#[from] MutationError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Path not found in workspace: {0}")]
    PathNotFound(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Cannot move {from} into its own subtree {into}")]
    MoveIntoDescendant { from: String, into: String },

    #[error("No directory has been granted yet. Run `handlefs grant <DIR>` first.")]
    NoRoot,

    #[error("Serve error: {0}")]
    ServeError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
