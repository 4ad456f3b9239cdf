//! In-memory host.
//!
//! Volumes are arenas of nodes addressed by id; handles hold the volume and a
//! node id, so a handle to a removed node goes stale exactly like a host handle
//! whose target was deleted. All locks are released before any `.await`.

use super::{validate_name, DirRef, DirectoryHandle, FileHandle, FileRef, Handle, HandleToken, Host};
use crate::error::HostError;
use crate::tree::path;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const ROOT_ID: u64 = 0;

#[derive(Debug)]
enum NodeKind {
    Directory { children: BTreeMap<String, u64> },
    File { data: Bytes },
}

#[derive(Debug)]
struct Node {
    name: String,
    kind: NodeKind,
}

#[derive(Debug)]
struct VolumeState {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    revoked: HashSet<u64>,
    mutations: u64,
    /// Match child names ignoring case, like APFS or NTFS defaults
    fold_case: bool,
    /// Largest content a handle write may store
    write_limit: Option<usize>,
}

impl VolumeState {
    fn new(name: &str, fold_case: bool) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            Node {
                name: name.to_string(),
                kind: NodeKind::Directory {
                    children: BTreeMap::new(),
                },
            },
        );
        Self {
            nodes,
            next_id: ROOT_ID + 1,
            revoked: HashSet::new(),
            mutations: 0,
            fold_case,
            write_limit: None,
        }
    }

    fn node(&self, id: u64) -> Result<&Node, HostError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| HostError::NotFound(format!("stale handle #{}", id)))
    }

    fn children(&self, id: u64) -> Result<&BTreeMap<String, u64>, HostError> {
        let node = self.node(id)?;
        if self.revoked.contains(&id) {
            return Err(HostError::PermissionDenied(node.name.clone()));
        }
        match &node.kind {
            NodeKind::Directory { children } => Ok(children),
            NodeKind::File { .. } => Err(HostError::NotADirectory(node.name.clone())),
        }
    }

    fn children_mut(&mut self, id: u64) -> Result<&mut BTreeMap<String, u64>, HostError> {
        if self.revoked.contains(&id) {
            return Err(HostError::PermissionDenied(format!("#{}", id)));
        }
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| HostError::NotFound(format!("stale handle #{}", id)))?;
        match &mut node.kind {
            NodeKind::Directory { children } => Ok(children),
            NodeKind::File { .. } => Err(HostError::NotADirectory(node.name.clone())),
        }
    }

    fn is_directory(&self, id: u64) -> bool {
        matches!(
            self.nodes.get(&id).map(|n| &n.kind),
            Some(NodeKind::Directory { .. })
        )
    }

    /// Stored name and id of the child of `parent` that `name` addresses.
    fn lookup(&self, parent: u64, name: &str) -> Result<Option<(String, u64)>, HostError> {
        Ok(self
            .find(self.children(parent)?, name)
            .map(|(stored, id)| (stored.to_string(), id)))
    }

    fn find<'a>(&self, children: &'a BTreeMap<String, u64>, name: &str) -> Option<(&'a str, u64)> {
        let found = if self.fold_case {
            children
                .iter()
                .find(|(stored, _)| stored.to_lowercase() == name.to_lowercase())
        } else {
            children.get_key_value(name)
        };
        found.map(|(stored, &id)| (stored.as_str(), id))
    }

    /// Get-or-create a child of `parent`. Returns the child id.
    fn child(
        &mut self,
        parent: u64,
        name: &str,
        directory: bool,
        create: bool,
    ) -> Result<u64, HostError> {
        validate_name(name)?;
        if let Some((_, id)) = self.lookup(parent, name)? {
            return match (directory, self.is_directory(id)) {
                (true, true) | (false, false) => Ok(id),
                (true, false) => Err(HostError::NotADirectory(name.to_string())),
                (false, true) => Err(HostError::NotAFile(name.to_string())),
            };
        }
        if !create {
            return Err(HostError::NotFound(name.to_string()));
        }

        let id = self.next_id;
        self.next_id += 1;
        let kind = if directory {
            NodeKind::Directory {
                children: BTreeMap::new(),
            }
        } else {
            NodeKind::File { data: Bytes::new() }
        };
        self.children_mut(parent)?.insert(name.to_string(), id);
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind,
            },
        );
        self.mutations += 1;
        Ok(id)
    }

    fn remove(&mut self, parent: u64, name: &str, recursive: bool) -> Result<(), HostError> {
        validate_name(name)?;
        let (stored, id) = self
            .lookup(parent, name)?
            .ok_or_else(|| HostError::NotFound(name.to_string()))?;
        if let NodeKind::Directory { children } = &self.node(id)?.kind {
            if !children.is_empty() && !recursive {
                return Err(HostError::Io(std::io::Error::other(format!(
                    "directory not empty: {}",
                    name
                ))));
            }
        }
        self.children_mut(parent)?.remove(&stored);
        self.drop_subtree(id);
        self.mutations += 1;
        Ok(())
    }

    fn drop_subtree(&mut self, id: u64) {
        if let Some(node) = self.nodes.remove(&id) {
            self.revoked.remove(&id);
            if let NodeKind::Directory { children } = node.kind {
                for child in children.into_values() {
                    self.drop_subtree(child);
                }
            }
        }
    }

    fn resolve(&self, path: &str) -> Option<u64> {
        let normalized = path::normalize(path, "");
        let mut current = ROOT_ID;
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            match &self.nodes.get(&current)?.kind {
                NodeKind::Directory { children } => current = self.find(children, segment)?.1,
                NodeKind::File { .. } => return None,
            }
        }
        Some(current)
    }

    fn collect_paths(&self, id: u64, prefix: &str, out: &mut Vec<String>) {
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get(&id)
        {
            for (name, child) in children {
                let child_path = path::normalize(prefix, name);
                out.push(child_path.clone());
                self.collect_paths(*child, &child_path, out);
            }
        }
    }
}

#[derive(Debug)]
struct VolumeInner {
    name: String,
    state: Mutex<VolumeState>,
}

/// A named in-memory directory tree.
///
/// Cloning shares the same volume. Besides the handle API, path-based helpers
/// make it convenient to seed and inspect fixtures.
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    inner: Arc<VolumeInner>,
}

impl MemoryVolume {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_case_folding(name.into(), false)
    }

    /// Volume whose child names match regardless of case.
    pub fn case_insensitive(name: impl Into<String>) -> Self {
        Self::with_case_folding(name.into(), true)
    }

    fn with_case_folding(name: String, fold_case: bool) -> Self {
        let state = VolumeState::new(&name, fold_case);
        Self {
            inner: Arc::new(VolumeInner {
                name,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Directory handle for the volume root.
    pub fn root(&self) -> DirRef {
        Arc::new(MemoryDirectory {
            volume: Arc::clone(&self.inner),
            id: ROOT_ID,
            name: self.inner.name.clone(),
        })
    }

    /// Create a directory and any missing parents.
    pub fn mkdir_p(&self, dir: &str) -> Result<(), HostError> {
        let mut state = self.inner.state.lock();
        let mut current = ROOT_ID;
        for segment in path::normalize(dir, "").split('/').filter(|s| !s.is_empty()) {
            current = state.child(current, segment, true, true)?;
        }
        Ok(())
    }

    /// Write a file, creating it and any missing parent directories.
    pub fn write(&self, file: &str, contents: impl Into<Bytes>) -> Result<(), HostError> {
        let parent = path::parent_path(file);
        self.mkdir_p(&parent)?;
        let name = path::basename(file).to_string();
        let mut state = self.inner.state.lock();
        let parent_id = state
            .resolve(&parent)
            .ok_or_else(|| HostError::NotFound(parent.clone()))?;
        let id = state.child(parent_id, &name, false, true)?;
        if let Some(node) = state.nodes.get_mut(&id) {
            node.kind = NodeKind::File {
                data: contents.into(),
            };
        }
        state.mutations += 1;
        Ok(())
    }

    /// Content of the file at `file`, if one exists there.
    pub fn read(&self, file: &str) -> Option<Bytes> {
        let state = self.inner.state.lock();
        let id = state.resolve(file)?;
        match &state.nodes.get(&id)?.kind {
            NodeKind::File { data } => Some(data.clone()),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn exists(&self, entry: &str) -> bool {
        self.inner.state.lock().resolve(entry).is_some()
    }

    pub fn is_dir(&self, entry: &str) -> bool {
        let state = self.inner.state.lock();
        state.resolve(entry).is_some_and(|id| state.is_directory(id))
    }

    /// Every path in the volume except the root, parents before children.
    pub fn paths(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut out = Vec::new();
        state.collect_paths(ROOT_ID, "/", &mut out);
        out
    }

    /// Deny enumeration of the directory at `dir` until [`MemoryVolume::restore`].
    pub fn revoke(&self, dir: &str) -> Result<(), HostError> {
        let mut state = self.inner.state.lock();
        let id = state
            .resolve(dir)
            .ok_or_else(|| HostError::NotFound(dir.to_string()))?;
        state.revoked.insert(id);
        Ok(())
    }

    pub fn restore(&self, dir: &str) {
        let mut state = self.inner.state.lock();
        if let Some(id) = state.resolve(dir) {
            state.revoked.remove(&id);
        }
    }

    /// Make handle writes larger than `limit` bytes fail, as a full disk would.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.inner.state.lock().write_limit = limit;
    }

    /// Number of mutating operations (create, write, remove) applied so far.
    pub fn mutation_count(&self) -> u64 {
        self.inner.state.lock().mutations
    }
}

/// Directory handle into a [`MemoryVolume`]
#[derive(Debug)]
pub struct MemoryDirectory {
    volume: Arc<VolumeInner>,
    id: u64,
    name: String,
}

impl MemoryDirectory {
    fn handle(&self, id: u64, name: &str) -> DirRef {
        Arc::new(MemoryDirectory {
            volume: Arc::clone(&self.volume),
            id,
            name: name.to_string(),
        })
    }

    fn file(&self, id: u64, name: &str) -> FileRef {
        Arc::new(MemoryFile {
            volume: Arc::clone(&self.volume),
            id,
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("memory:{}#{}", self.volume.name, self.id)
    }

    fn token(&self) -> HandleToken {
        HandleToken::Memory {
            volume: self.volume.name.clone(),
        }
    }

    async fn entries(&self) -> Result<Vec<(String, Handle)>, HostError> {
        let state = self.volume.state.lock();
        let children = state.children(self.id)?;
        let handles = children
            .iter()
            .map(|(name, &id)| {
                let handle = if state.is_directory(id) {
                    Handle::Directory(self.handle(id, name))
                } else {
                    Handle::File(self.file(id, name))
                };
                (name.clone(), handle)
            })
            .collect();
        Ok(handles)
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirRef, HostError> {
        let id = self.volume.state.lock().child(self.id, name, true, create)?;
        Ok(self.handle(id, name))
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef, HostError> {
        let id = self.volume.state.lock().child(self.id, name, false, create)?;
        Ok(self.file(id, name))
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<(), HostError> {
        self.volume.state.lock().remove(self.id, name, recursive)
    }
}

/// File handle into a [`MemoryVolume`]
#[derive(Debug)]
pub struct MemoryFile {
    volume: Arc<VolumeInner>,
    id: u64,
    name: String,
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("memory:{}#{}", self.volume.name, self.id)
    }

    fn content_type(&self) -> Option<String> {
        super::declared_content_type(&self.name).map(str::to_string)
    }

    async fn read(&self) -> Result<Bytes, HostError> {
        let state = self.volume.state.lock();
        match &state.node(self.id)?.kind {
            NodeKind::File { data } => Ok(data.clone()),
            NodeKind::Directory { .. } => Err(HostError::NotAFile(self.name.clone())),
        }
    }

    async fn write(&self, contents: &[u8]) -> Result<(), HostError> {
        let mut state = self.volume.state.lock();
        if state.write_limit.is_some_and(|limit| contents.len() > limit) {
            return Err(HostError::Io(std::io::Error::other(format!(
                "no space left for {} bytes",
                contents.len()
            ))));
        }
        let node = state
            .nodes
            .get_mut(&self.id)
            .ok_or_else(|| HostError::NotFound(format!("stale handle #{}", self.id)))?;
        node.kind = NodeKind::File {
            data: Bytes::copy_from_slice(contents),
        };
        state.mutations += 1;
        Ok(())
    }
}

/// Host that activates [`HandleToken::Memory`] tokens from its named volumes.
#[derive(Debug, Default)]
pub struct MemoryHost {
    volumes: RwLock<HashMap<String, MemoryVolume>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the volume called `name`.
    pub fn volume(&self, name: &str) -> MemoryVolume {
        if let Some(volume) = self.volumes.read().get(name) {
            return volume.clone();
        }
        self.volumes
            .write()
            .entry(name.to_string())
            .or_insert_with(|| MemoryVolume::new(name))
            .clone()
    }

    /// Forget a volume; tokens pointing at it no longer activate.
    pub fn remove_volume(&self, name: &str) {
        self.volumes.write().remove(name);
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn activate(&self, token: &HandleToken) -> Result<DirRef, HostError> {
        match token {
            HandleToken::Memory { volume } => self
                .volumes
                .read()
                .get(volume)
                .map(MemoryVolume::root)
                .ok_or_else(|| HostError::NotFound(format!("volume {}", volume))),
            other => Err(HostError::UnknownToken(other.to_string())),
        }
    }
}
