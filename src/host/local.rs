//! Local disk host.
//!
//! Directory and file handles backed by real paths, accessed through
//! `tokio::fs`. Symbolic links are not followed and are left out of
//! enumeration.

use super::{validate_name, DirRef, DirectoryHandle, FileHandle, FileRef, Handle, HandleToken, Host};
use crate::error::HostError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Map an I/O error on `path` into the host error taxonomy.
fn map_io(err: io::Error, path: &Path) -> HostError {
    match err.kind() {
        io::ErrorKind::NotFound => HostError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            HostError::PermissionDenied(path.display().to_string())
        }
        _ => HostError::Io(err),
    }
}

/// Device and inode of `path`, the same for every name that reaches it.
#[cfg(unix)]
async fn resolved_key(path: &Path) -> Result<String, HostError> {
    use std::os::unix::fs::MetadataExt;

    let metadata = fs::metadata(path).await.map_err(|e| map_io(e, path))?;
    Ok(format!("{}:{}", metadata.dev(), metadata.ino()))
}

/// Final path of `path` as the filesystem spells it.
#[cfg(not(unix))]
async fn resolved_key(path: &Path) -> Result<String, HostError> {
    let canonical = fs::canonicalize(path).await.map_err(|e| map_io(e, path))?;
    Ok(canonical.display().to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Directory handle on the local disk
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
}

impl LocalDirectory {
    /// Open an existing directory, canonicalizing its path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let canonical = dunce::canonicalize(path).map_err(|e| map_io(e, path))?;
        let metadata = std::fs::metadata(&canonical).map_err(|e| map_io(e, &canonical))?;
        if !metadata.is_dir() {
            return Err(HostError::NotADirectory(canonical.display().to_string()));
        }
        Ok(Self::at(canonical))
    }

    fn at(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self { path, name }
    }

    /// Absolute path of this directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn child(&self, name: &str) -> Result<PathBuf, HostError> {
        validate_name(name)?;
        Ok(self.path.join(name))
    }
}

#[async_trait]
impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        self.path.display().to_string()
    }

    fn token(&self) -> HandleToken {
        HandleToken::Local {
            path: self.path.clone(),
        }
    }

    async fn resolved_identity(&self) -> Result<String, HostError> {
        resolved_key(&self.path).await
    }

    async fn entries(&self) -> Result<Vec<(String, Handle)>, HostError> {
        let mut reader = fs::read_dir(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        let mut children = Vec::new();

        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| map_io(e, &self.path))?
        {
            let file_type = entry.file_type().await.map_err(|e| map_io(e, &entry.path()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            let handle = if file_type.is_dir() {
                Handle::Directory(Arc::new(LocalDirectory::at(path)))
            } else if file_type.is_file() {
                Handle::File(Arc::new(LocalFile::at(path)))
            } else {
                debug!(path = %path.display(), "Skipping non-regular entry");
                continue;
            };
            children.push((name, handle));
        }

        Ok(children)
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirRef, HostError> {
        let path = self.child(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(Arc::new(LocalDirectory::at(path))),
            Ok(_) => Err(HostError::NotADirectory(path.display().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                match fs::create_dir(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(map_io(e, &path)),
                }
                Ok(Arc::new(LocalDirectory::at(path)))
            }
            Err(e) => Err(map_io(e, &path)),
        }
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef, HostError> {
        let path = self.child(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Arc::new(LocalFile::at(path))),
            Ok(_) => Err(HostError::NotAFile(path.display().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)
                    .await
                    .map_err(|e| map_io(e, &path))?;
                Ok(Arc::new(LocalFile::at(path)))
            }
            Err(e) => Err(map_io(e, &path)),
        }
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<(), HostError> {
        let path = self.child(name)?;
        let metadata = fs::symlink_metadata(&path)
            .await
            .map_err(|e| map_io(e, &path))?;

        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_dir(&path).await
            }
        } else {
            fs::remove_file(&path).await
        };
        result.map_err(|e| map_io(e, &path))
    }
}

/// File handle on the local disk
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    fn at(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        self.path.display().to_string()
    }

    fn content_type(&self) -> Option<String> {
        super::declared_content_type(&self.name).map(str::to_string)
    }

    async fn read(&self) -> Result<Bytes, HostError> {
        let contents = fs::read(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        Ok(Bytes::from(contents))
    }

    async fn write(&self, contents: &[u8]) -> Result<(), HostError> {
        fs::write(&self.path, contents)
            .await
            .map_err(|e| map_io(e, &self.path))
    }

    async fn resolved_identity(&self) -> Result<String, HostError> {
        resolved_key(&self.path).await
    }
}

/// Host that activates [`HandleToken::Local`] tokens.
#[derive(Debug, Clone, Default)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn activate(&self, token: &HandleToken) -> Result<DirRef, HostError> {
        match token {
            HandleToken::Local { path } => {
                let metadata = fs::metadata(path).await.map_err(|e| map_io(e, path))?;
                if !metadata.is_dir() {
                    return Err(HostError::NotADirectory(path.display().to_string()));
                }
                Ok(Arc::new(LocalDirectory::at(path.clone())))
            }
            other => Err(HostError::UnknownToken(other.to_string())),
        }
    }
}
