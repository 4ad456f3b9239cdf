//! Persisted Index
//!
//! A durable, versioned key-value collection keyed by path. The record under
//! the sentinel key `"/"` is the root pointer: the serialized token of the
//! granted root directory. Everything else about the tree is rebuilt by
//! walking from that pointer, so the store is a pointer cache rather than a
//! mirror of the filesystem.

pub mod persistence;

pub use persistence::{PersistedIndex, SledIndexStore};

use crate::error::StorageError;
use crate::host::HandleToken;
use crate::tree::entry::{Entry, EntryKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel key of the root pointer
pub const ROOT_KEY: &str = "/";

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Default name of the record collection
pub const DEFAULT_STORE_NAME: &str = "entries";

/// Pointer to the granted root directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootRecord {
    pub token: HandleToken,
    /// Name of the root directory when it was granted
    pub name: String,
    pub granted_at: DateTime<Utc>,
}

/// Path-keyed record for one entry, without its handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub path: String,
    pub parent_path: String,
    pub name: String,
    pub kind: EntryKind,
}

impl IndexRecord {
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            path: entry.path.clone(),
            parent_path: entry.parent_path.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
        }
    }
}

/// Any value stored in the record collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredRecord {
    Root(RootRecord),
    Entry(IndexRecord),
}

impl StoredRecord {
    /// Key this record is stored under.
    pub fn key(&self) -> &str {
        match self {
            StoredRecord::Root(_) => ROOT_KEY,
            StoredRecord::Entry(record) => &record.path,
        }
    }
}

/// Where the durable store lives and which schema it is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocation {
    /// Directory of the sled database
    pub path: PathBuf,
    /// Name of the record collection
    pub store_name: String,
    pub version: u32,
}

impl IndexLocation {
    /// Location with the default collection name and schema version.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            version: SCHEMA_VERSION,
        }
    }
}

/// Synchronous operations on an opened index store.
pub trait IndexStore {
    /// Insert or replace the record for `record.path`. The root key is reserved.
    fn put(&self, record: &IndexRecord) -> Result<(), StorageError>;

    /// Remove the record under `key`. Returns whether one existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError>;

    fn get_root(&self) -> Result<Option<RootRecord>, StorageError>;

    /// Replace every record with exactly one root pointer.
    fn register_root(&self, root: &RootRecord) -> Result<(), StorageError>;
}
