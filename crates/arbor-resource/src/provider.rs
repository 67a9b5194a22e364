//! The resource-provider seam between the engine and the filesystem.

use crate::watch::WatchSubscription;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by resource providers.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// I/O error from the underlying filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path does not exist
    #[error("resource not found: {0}")]
    NotFound(PathBuf),

    /// Directory operation on a non-directory
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Watcher could not be established
    #[error("watch error: {0}")]
    Watch(String),
}

/// What lives at a path right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    File,
    Folder,
    Missing,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Abstracts the filesystem and its watcher.
///
/// Listings are name-sorted so every traversal over a provider is
/// deterministic. A folder that disappears between enumeration and read
/// surfaces as [`ResourceError::NotFound`]; callers recover by treating
/// it as empty.
pub trait ResourceProvider: Send + Sync {
    /// What is at `path` right now.
    fn get_resource(&self, path: &Path) -> Resource;

    /// Read a file to a string.
    fn read_to_string(&self, path: &Path) -> Result<String, ResourceError>;

    /// Direct children of a directory, sorted by name.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, ResourceError>;

    /// Subscribe to changes under `folder`, recursively. Events are
    /// delivered FIFO per subscription; dropping the subscription cancels
    /// the watch.
    fn watch(&self, folder: &Path) -> Result<WatchSubscription, ResourceError>;

    fn exists(&self, path: &Path) -> bool {
        !matches!(self.get_resource(path), Resource::Missing)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.get_resource(path), Resource::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.get_resource(path), Resource::Folder)
    }
}
