//! Persistence layer for the index store

use crate::error::StorageError;
use crate::host::{DirRef, Host};
use crate::store::{IndexLocation, IndexRecord, IndexStore, RootRecord, StoredRecord, ROOT_KEY};
use crate::tree::entry::FlatIndex;
use crate::tree::walker::{WalkStats, Walker, WalkerConfig};
use bincode;
use chrono::Utc;
use sled;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, instrument, warn};

const META_TREE: &str = "meta";
const VERSION_KEY: &[u8] = b"schema_version";

/// Sled-backed index store, open for the lifetime of this value
pub struct SledIndexStore {
    db: sled::Db,
    records: sled::Tree,
}

impl SledIndexStore {
    /// Open (creating if needed) the store at `location` and check its schema.
    ///
    /// A store written by a newer schema is refused; an older one is upgraded
    /// in place. Upgrades only ever raise the version stamp.
    pub fn open(location: &IndexLocation) -> Result<Self, StorageError> {
        let db = sled::open(&location.path).map_err(|e| StorageError::Open {
            path: location.path.clone(),
            message: e.to_string(),
        })?;

        let meta = db.open_tree(META_TREE)?;
        let found = match meta.get(VERSION_KEY)? {
            Some(bytes) => decode_version(&bytes)?,
            None => 0,
        };
        if found > location.version {
            return Err(StorageError::SchemaTooNew {
                found,
                supported: location.version,
            });
        }
        if found < location.version {
            meta.insert(VERSION_KEY, &location.version.to_be_bytes())?;
            if found > 0 {
                info!(from = found, to = location.version, "Upgraded index schema");
            }
        }

        let records = db.open_tree(&location.store_name)?;
        Ok(Self { db, records })
    }

    /// Schema version stamped in the store
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let meta = self.db.open_tree(META_TREE)?;
        match meta.get(VERSION_KEY)? {
            Some(bytes) => decode_version(&bytes),
            None => Ok(0),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_version(bytes: &[u8]) -> Result<u32, StorageError> {
    <[u8; 4]>::try_from(bytes)
        .map(u32::from_be_bytes)
        .map_err(|_| StorageError::Codec(format!("bad schema version stamp: {:?}", bytes)))
}

impl IndexStore for SledIndexStore {
    fn put(&self, record: &IndexRecord) -> Result<(), StorageError> {
        if record.path == ROOT_KEY {
            return Err(StorageError::ReservedKey(record.path.clone()));
        }
        let value = bincode::serialize(&StoredRecord::Entry(record.clone()))?;
        self.records.insert(record.path.as_bytes(), value)?;
        self.flush()
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let existed = self.records.remove(key.as_bytes())?.is_some();
        self.flush()?;
        Ok(existed)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.records.clear()?;
        self.flush()
    }

    fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        let mut records = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            records.push(bincode::deserialize::<StoredRecord>(&value)?);
        }
        Ok(records)
    }

    fn get_root(&self) -> Result<Option<RootRecord>, StorageError> {
        match self.records.get(ROOT_KEY.as_bytes())? {
            Some(value) => match bincode::deserialize::<StoredRecord>(&value)? {
                StoredRecord::Root(root) => Ok(Some(root)),
                StoredRecord::Entry(_) => Err(StorageError::Codec(
                    "root key holds an entry record".to_string(),
                )),
            },
            None => Ok(None),
        }
    }

    fn register_root(&self, root: &RootRecord) -> Result<(), StorageError> {
        let value = bincode::serialize(&StoredRecord::Root(root.clone()))?;

        let mut batch = sled::Batch::default();
        for key in self.records.iter().keys() {
            batch.remove(key?);
        }
        batch.insert(ROOT_KEY.as_bytes(), value);

        self.records.apply_batch(batch)?;
        self.flush()
    }
}

/// Per-path gates that keep this process from opening one database twice at once.
///
/// sled takes an exclusive file lock on open, so a second concurrent open of
/// the same path from this process would fail rather than wait. The map holds
/// weak references; a gate lives only while some caller holds it, and dead
/// slots are pruned whenever a new gate is handed out.
#[derive(Default)]
struct Gates {
    slots: parking_lot::Mutex<HashMap<PathBuf, Weak<tokio::sync::Mutex<()>>>>,
}

impl Gates {
    fn gate(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(gate) = slots.get(path).and_then(Weak::upgrade) {
            return gate;
        }
        slots.retain(|_, slot| slot.strong_count() > 0);
        let gate = Arc::new(tokio::sync::Mutex::new(()));
        slots.insert(path.to_path_buf(), Arc::downgrade(&gate));
        gate
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

fn gate_for(path: &Path) -> Arc<tokio::sync::Mutex<()>> {
    static GATES: OnceLock<Gates> = OnceLock::new();
    GATES.get_or_init(Gates::default).gate(path)
}

/// Asynchronous access to the durable index.
///
/// Holds only the location. Every operation opens the store on a blocking
/// thread, performs its work, and drops the store before returning, so two
/// independent consumers (the workspace and the interceptor) never share a
/// live connection.
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    location: IndexLocation,
}

impl PersistedIndex {
    pub fn new(location: IndexLocation) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    async fn with_store<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&SledIndexStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let gate = gate_for(&self.location.path);
        let _open = gate.lock().await;
        let location = self.location.clone();
        tokio::task::spawn_blocking(move || {
            let store = SledIndexStore::open(&location)?;
            op(&store)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Open or create the store and its schema. Returns the schema version.
    pub async fn open_store(&self) -> Result<u32, StorageError> {
        self.with_store(|store| store.schema_version()).await
    }

    pub async fn put(&self, record: IndexRecord) -> Result<(), StorageError> {
        self.with_store(move |store| store.put(&record)).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();
        self.with_store(move |store| store.delete(&key)).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.with_store(|store| store.clear()).await
    }

    pub async fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        self.with_store(|store| store.get_all()).await
    }

    pub async fn get_root(&self) -> Result<Option<RootRecord>, StorageError> {
        self.with_store(|store| store.get_root()).await
    }

    /// Record `root` as the granted directory, replacing every prior record.
    #[instrument(skip(self, root), fields(root = %root.name()))]
    pub async fn register_root(&self, root: &DirRef) -> Result<RootRecord, StorageError> {
        let record = RootRecord {
            token: root.token(),
            name: root.name().to_string(),
            granted_at: Utc::now(),
        };
        let stored = record.clone();
        self.with_store(move |store| store.register_root(&stored)).await?;
        info!(token = %record.token, "Registered root directory");
        Ok(record)
    }

    /// Rebuild the flat index by walking from the stored root pointer.
    ///
    /// No root record means nothing has been granted yet: the result is an
    /// empty index, not an error.
    pub async fn get_all_from_index(
        &self,
        host: &dyn Host,
        config: &WalkerConfig,
    ) -> Result<FlatIndex, StorageError> {
        Ok(self
            .walk_from_root(host, config)
            .await?
            .map(|(index, _)| index)
            .unwrap_or_default())
    }

    /// Like [`PersistedIndex::get_all_from_index`], also returning the root
    /// record and walk counters. `None` when no root is registered.
    pub async fn walk_from_root(
        &self,
        host: &dyn Host,
        config: &WalkerConfig,
    ) -> Result<Option<(FlatIndex, WalkStats)>, StorageError> {
        let Some(root) = self.get_root().await? else {
            debug!("No root registered; index is empty");
            return Ok(None);
        };
        let dir = host.activate(&root.token).await.map_err(|e| {
            warn!(token = %root.token, error = %e, "Root handle could not be activated");
            StorageError::Host(e)
        })?;
        let walked = Walker::with_config(dir, config.clone())
            .walk_with_stats()
            .await;
        Ok(Some(walked))
    }
}
