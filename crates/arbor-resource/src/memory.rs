//! In-memory resource provider for deterministic tests.

use crate::paths;
use crate::provider::{DirEntry, Resource, ResourceError, ResourceProvider};
use crate::watch::{ChangeKind, WatchEvent, WatchMessage, WatchSubscription};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
enum Entry {
    File(String),
    Dir,
}

struct WatcherReg {
    id: u64,
    root: PathBuf,
    tx: mpsc::UnboundedSender<WatchMessage>,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<PathBuf, Entry>,
    watchers: Vec<WatcherReg>,
    next_watcher: u64,
}

/// A filesystem that lives in a map.
///
/// Mutators synthesise watch events to every subscription whose root
/// contains the touched path, in call order, so tests observe the exact
/// FIFO-per-root delivery the engine is specified against.
#[derive(Clone, Default)]
pub struct MemoryResourceProvider {
    state: Arc<RwLock<State>>,
}

impl MemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory (and its ancestors), firing events for each
    /// directory that did not exist before.
    pub fn make_dir(&self, path: &Path) {
        let created = {
            let mut state = self.state.write();
            ensure_dir(&mut state.entries, path)
        };
        for dir in created {
            self.fire(&dir, ChangeKind::Created);
        }
    }

    /// Create or overwrite a file, creating parent directories as needed.
    pub fn write_file(&self, path: &Path, content: &str) {
        let (created_dirs, kind) = {
            let mut state = self.state.write();
            let created = match path.parent() {
                Some(parent) => ensure_dir(&mut state.entries, parent),
                None => Vec::new(),
            };
            let existed = state.entries.contains_key(path);
            state
                .entries
                .insert(path.to_path_buf(), Entry::File(content.to_string()));
            let kind = if existed {
                ChangeKind::Modified
            } else {
                ChangeKind::Created
            };
            (created, kind)
        };
        for dir in created_dirs {
            self.fire(&dir, ChangeKind::Created);
        }
        self.fire(path, kind);
    }

    /// Delete a file; no-op when absent.
    pub fn remove_file(&self, path: &Path) {
        let removed = self.state.write().entries.remove(path).is_some();
        if removed {
            self.fire(path, ChangeKind::Deleted);
        }
    }

    /// Delete a directory and everything under it, firing deletions
    /// deepest-first.
    pub fn remove_dir(&self, path: &Path) {
        let removed: Vec<PathBuf> = {
            let mut state = self.state.write();
            let doomed: Vec<PathBuf> = state
                .entries
                .keys()
                .filter(|p| paths::is_within(path, p))
                .cloned()
                .collect();
            for p in &doomed {
                state.entries.remove(p);
            }
            doomed
        };
        let mut ordered = removed;
        ordered.sort_by(|a, b| paths::depth(b).cmp(&paths::depth(a)).then(a.cmp(b)));
        for p in ordered {
            self.fire(&p, ChangeKind::Deleted);
        }
    }

    /// Re-announce a file as modified without changing its contents.
    pub fn touch(&self, path: &Path) {
        if self.is_file(path) {
            self.fire(path, ChangeKind::Modified);
        }
    }

    /// Inject a watcher failure for every subscription whose root covers
    /// `path`. Used to exercise overflow recovery.
    pub fn fire_overflow(&self, path: &Path) {
        let state = self.state.read();
        for watcher in &state.watchers {
            if paths::is_within(&watcher.root, path) || paths::is_within(path, &watcher.root) {
                let _ = watcher
                    .tx
                    .send(WatchMessage::Overflow("injected overflow".into()));
            }
        }
    }

    /// Number of live subscriptions, for release assertions.
    pub fn watcher_count(&self) -> usize {
        self.state.read().watchers.len()
    }

    fn fire(&self, path: &Path, kind: ChangeKind) {
        let state = self.state.read();
        for watcher in &state.watchers {
            if paths::is_within(&watcher.root, path) {
                let _ = watcher
                    .tx
                    .send(WatchMessage::Event(WatchEvent::new(path, kind)));
            }
        }
    }
}

/// Insert `path` and any missing ancestors as directories; returns the
/// newly created ones, outermost first.
fn ensure_dir(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    let mut cursor = Some(path);
    while let Some(dir) = cursor {
        if dir.parent().is_none() {
            break;
        }
        if entries.contains_key(dir) {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }
    missing.reverse();
    for dir in &missing {
        entries.insert(dir.clone(), Entry::Dir);
    }
    missing
}

/// Removes the watcher registration when the subscription is dropped.
struct Unwatch {
    state: Arc<RwLock<State>>,
    id: u64,
}

impl Drop for Unwatch {
    fn drop(&mut self) {
        self.state.write().watchers.retain(|w| w.id != self.id);
    }
}

impl ResourceProvider for MemoryResourceProvider {
    fn get_resource(&self, path: &Path) -> Resource {
        if path.parent().is_none() {
            return Resource::Folder;
        }
        match self.state.read().entries.get(path) {
            Some(Entry::File(_)) => Resource::File,
            Some(Entry::Dir) => Resource::Folder,
            None => Resource::Missing,
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ResourceError> {
        match self.state.read().entries.get(path) {
            Some(Entry::File(content)) => Ok(content.clone()),
            _ => Err(ResourceError::NotFound(path.to_path_buf())),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, ResourceError> {
        let state = self.state.read();
        match state.entries.get(path) {
            Some(Entry::Dir) => {}
            Some(Entry::File(_)) => return Err(ResourceError::NotADirectory(path.to_path_buf())),
            None if path.parent().is_none() => {}
            None => return Err(ResourceError::NotFound(path.to_path_buf())),
        }
        // BTreeMap iteration is already name-ordered.
        let entries = state
            .entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, e)| DirEntry {
                path: p.clone(),
                is_dir: matches!(e, Entry::Dir),
            })
            .collect();
        Ok(entries)
    }

    fn watch(&self, folder: &Path) -> Result<WatchSubscription, ResourceError> {
        if !self.is_dir(folder) {
            return Err(ResourceError::NotFound(folder.to_path_buf()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.write();
            let id = state.next_watcher;
            state.next_watcher += 1;
            state.watchers.push(WatcherReg {
                id,
                root: folder.to_path_buf(),
                tx,
            });
            id
        };
        let guard = Unwatch {
            state: self.state.clone(),
            id,
        };
        Ok(WatchSubscription::new(folder, rx).with_backend(Box::new(guard)))
    }
}
