//! Std-filesystem provider backed by `notify` watchers.

use crate::provider::{DirEntry, Resource, ResourceError, ResourceProvider};
use crate::watch::{ChangeKind, WatchEvent, WatchMessage, WatchSubscription};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Resource provider over the real filesystem.
///
/// One `notify` watcher is created per subscription so that dropping a
/// [`WatchSubscription`] releases exactly the watch it owns. Events are
/// forwarded raw; debouncing is the consumer's business, not ours.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdResourceProvider;

impl StdResourceProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceProvider for StdResourceProvider {
    fn get_resource(&self, path: &Path) -> Resource {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Resource::Folder,
            Ok(_) => Resource::File,
            Err(_) => Resource::Missing,
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ResourceError> {
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(path.to_path_buf()),
            _ => ResourceError::Io(e),
        })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, ResourceError> {
        let read = std::fs::read_dir(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::NotADirectory => ResourceError::NotADirectory(path.to_path_buf()),
            _ => ResourceError::Io(e),
        })?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(ResourceError::Io)?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                path: entry.path(),
                is_dir,
            });
        }
        // Sort for deterministic traversal order.
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn watch(&self, folder: &Path) -> Result<WatchSubscription, ResourceError> {
        if !self.is_dir(folder) {
            return Err(ResourceError::NotFound(folder.to_path_buf()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if event.need_rescan() {
                        let _ = event_tx.send(WatchMessage::Overflow("rescan requested".into()));
                        return;
                    }
                    let Some(kind) = convert_kind(&event.kind) else {
                        return;
                    };
                    for path in &event.paths {
                        debug!(path = ?path, kind = ?kind, "fs change");
                        let _ = event_tx.send(WatchMessage::Event(WatchEvent::new(path, kind)));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "watcher backend error");
                    let _ = tx.send(WatchMessage::Overflow(e.to_string()));
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| ResourceError::Watch(e.to_string()))?;

        watcher
            .watch(folder, RecursiveMode::Recursive)
            .map_err(|e| ResourceError::Watch(e.to_string()))?;

        debug!(folder = ?folder, "watch established");

        Ok(WatchSubscription::new(folder, rx).with_backend(Box::new(watcher)))
    }
}

/// Map a `notify` event kind onto ours. Access and metadata-only events
/// carry no information the engine acts on.
fn convert_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}
