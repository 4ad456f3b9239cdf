//! Directory walker for traversing handle-based directory structures

use crate::host::{DirRef, Handle};
use crate::tree::entry::{Entry, FlatIndex};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Walker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Entry names to leave out, together with everything below them
    pub ignore_patterns: Vec<String>,
    /// Deepest directory level to enter (None = unlimited). Top-level entries are depth 1.
    pub max_depth: Option<usize>,
}

/// Counters gathered during a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub directories: usize,
    pub files: usize,
    /// Subdirectories whose enumeration failed and whose contents are missing
    pub failed_branches: usize,
}

/// Entries found below one directory
#[derive(Default)]
struct Branch {
    entries: Vec<Entry>,
    failed: usize,
}

impl Branch {
    fn absorb(&mut self, other: Branch) {
        self.entries.extend(other.entries);
        self.failed += other.failed;
    }
}

/// Depth-first walker over a root directory handle
pub struct Walker {
    root: DirRef,
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given root handle
    pub fn new(root: DirRef) -> Self {
        Self {
            root,
            config: WalkerConfig::default(),
        }
    }

    /// Create a walker with custom configuration
    pub fn with_config(root: DirRef, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Walk the whole tree and return the flat index, root included.
    ///
    /// A subdirectory that cannot be enumerated is logged and skipped; the walk
    /// itself never fails.
    pub async fn walk(&self) -> FlatIndex {
        self.walk_with_stats().await.0
    }

    #[instrument(skip(self), fields(root = %self.root.name()))]
    pub async fn walk_with_stats(&self) -> (FlatIndex, WalkStats) {
        let start = Instant::now();
        let branch = self.visit(self.root.clone(), "/".to_string(), 1).await;

        let mut index = FlatIndex::new();
        index.insert(Entry::root(self.root.clone()));
        index.extend(branch.entries);

        let stats = WalkStats {
            directories: index.directories().count(),
            files: index.files().count(),
            failed_branches: branch.failed,
        };
        info!(
            entries = index.len(),
            directories = stats.directories,
            files = stats.files,
            failed_branches = stats.failed_branches,
            duration_ms = start.elapsed().as_millis(),
            "Walk completed"
        );
        (index, stats)
    }

    /// Enumerate `dir` and recurse into its subdirectories concurrently.
    ///
    /// All child traversals are joined before this branch resolves.
    fn visit(&self, dir: DirRef, dir_path: String, depth: usize) -> BoxFuture<'_, Branch> {
        async move {
            let children = match dir.entries().await {
                Ok(children) => children,
                Err(e) => {
                    warn!(path = %dir_path, error = %e, "Abandoning directory branch");
                    return Branch {
                        entries: Vec::new(),
                        failed: 1,
                    };
                }
            };

            let mut branch = Branch::default();
            let mut subdirectories = Vec::new();

            for (name, handle) in children {
                if self.should_ignore(&name) {
                    debug!(path = %dir_path, name = %name, "Ignoring entry");
                    continue;
                }
                let entry = Entry::child(&dir_path, &name, handle);
                if let Handle::Directory(sub) = &entry.handle {
                    if self.config.max_depth.map_or(true, |max| depth < max) {
                        subdirectories.push(self.visit(sub.clone(), entry.path.clone(), depth + 1));
                    }
                }
                branch.entries.push(entry);
            }

            for child in join_all(subdirectories).await {
                branch.absorb(child);
            }
            branch
        }
        .boxed()
    }

    fn should_ignore(&self, name: &str) -> bool {
        self.config.ignore_patterns.iter().any(|pattern| pattern == name)
    }
}
