//! Entries and the flat path-to-entry index

use crate::host::{DirRef, Handle};
use crate::tree::path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Directory,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::File => write!(f, "file"),
        }
    }
}

/// One filesystem object at a point in time.
///
/// `path` is normalized and NFC composed; the root has path `"/"`, an empty
/// `parent_path` and an empty `name`. For every other entry
/// `path == path::join(parent_path, name)`, while `name` keeps the spelling the
/// host reported so handle calls address the stored entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub parent_path: String,
    pub name: String,
    pub kind: EntryKind,
    pub handle: Handle,
}

impl Entry {
    /// Entry for the root directory.
    pub fn root(handle: DirRef) -> Self {
        Self {
            path: "/".to_string(),
            parent_path: String::new(),
            name: String::new(),
            kind: EntryKind::Directory,
            handle: Handle::Directory(handle),
        }
    }

    /// Entry for child `name` of the directory at `parent_path`.
    pub fn child(parent_path: &str, name: &str, handle: Handle) -> Self {
        let parent_path = path::normalize_path(parent_path);
        Self {
            path: path::join(&parent_path, name),
            parent_path,
            name: name.to_string(),
            kind: handle.kind(),
            handle,
        }
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Name to show for this entry; the root shows its directory's own name.
    pub fn display_name(&self) -> &str {
        if self.is_root() {
            self.handle.name()
        } else {
            &self.name
        }
    }
}

/// Complete path-to-entry mapping for a directory subtree.
///
/// Iteration is in path order, so a directory always precedes its descendants.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: BTreeMap<String, Entry>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry at the same path.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Look up a path after normalizing it.
    pub fn lookup(&self, raw_path: &str) -> Option<&Entry> {
        self.entries.get(&path::normalize_path(raw_path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn root(&self) -> Option<&Entry> {
        self.entries.get("/")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn directories(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| e.kind == EntryKind::Directory)
    }

    /// Immediate children of the directory at `path`.
    pub fn children_of<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.iter().filter(move |e| !e.is_root() && e.parent_path == path)
    }

    /// Entries whose parent is missing or is not a directory.
    pub fn orphans(&self) -> Vec<&Entry> {
        self.iter()
            .filter(|e| {
                !e.is_root()
                    && !self
                        .entries
                        .get(&e.parent_path)
                        .is_some_and(Entry::is_directory)
            })
            .collect()
    }
}

impl FromIterator<Entry> for FlatIndex {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut index = FlatIndex::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

impl Extend<Entry> for FlatIndex {
    fn extend<I: IntoIterator<Item = Entry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl<'a> IntoIterator for &'a FlatIndex {
    type Item = &'a Entry;
    type IntoIter = std::collections::btree_map::Values<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
