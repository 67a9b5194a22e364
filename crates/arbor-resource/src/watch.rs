//! Watch events and per-root subscriptions.

use std::any::Any;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Kind of filesystem change reported by a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Path appeared
    Created,
    /// Path contents changed
    Modified,
    /// Path disappeared
    Deleted,
}

/// A single filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path of the changed resource
    pub path: PathBuf,
    /// Kind of change
    pub kind: ChangeKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What a subscription yields: an event, or a backend failure that
/// invalidates everything observed so far.
#[derive(Debug, Clone)]
pub enum WatchMessage {
    Event(WatchEvent),
    /// The watcher lost events (queue overflow, rescan request, backend
    /// error). The consumer must rebuild its view of the watched root.
    Overflow(String),
}

/// A live subscription to changes under one root folder.
///
/// Events arrive in filesystem order for this root. Dropping the
/// subscription releases the underlying watcher.
pub struct WatchSubscription {
    root: PathBuf,
    rx: mpsc::UnboundedReceiver<WatchMessage>,
    _backend: Option<Box<dyn Any + Send>>,
}

impl WatchSubscription {
    pub fn new(root: impl Into<PathBuf>, rx: mpsc::UnboundedReceiver<WatchMessage>) -> Self {
        Self {
            root: root.into(),
            rx,
            _backend: None,
        }
    }

    /// Attach backend state (e.g. the native watcher) that must live as
    /// long as the subscription.
    pub fn with_backend(mut self, backend: Box<dyn Any + Send>) -> Self {
        self._backend = Some(backend);
        self
    }

    /// The watched root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive the next message without blocking.
    pub fn try_next(&mut self) -> Option<WatchMessage> {
        self.rx.try_recv().ok()
    }

    /// Receive the next message, waiting for one to arrive.
    pub async fn next(&mut self) -> Option<WatchMessage> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("root", &self.root)
            .finish()
    }
}
