//! The driver seam: how the engine talks to the analysis side.

use crate::changeset::ChangeSet;
use crate::disposition::FolderDisposition;
use arbor_resource::WatchEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque handle the driver issues for each registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceHandle(pub u64);

/// The slice of analysis options the engine itself consumes.
///
/// The engine feeds `exclude_patterns` into the context's
/// [`crate::PathFilter`]; everything else in the options file is the
/// driver's business and stays behind the factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// One analysis driver, bound to one context.
///
/// Owned by its context node; only the engine mutates its file set.
pub trait AnalysisDriver: Send + Sync {
    /// Register a file and issue its source handle.
    fn add_file(&self, path: &Path) -> SourceHandle;

    /// A file's content changed.
    fn change_file(&self, path: &Path);

    /// The driver's current file set.
    fn added_files(&self) -> BTreeSet<PathBuf>;

    /// Replace options and package resolution in one step.
    fn configure(&self, options: &AnalysisOptions, disposition: &FolderDisposition);
}

/// Callback surface through which the engine reports every mutation.
///
/// Optional hooks default to no-ops so embedders implement only what
/// they observe.
pub trait DriverFactory: Send {
    /// A context was created; produce its driver.
    fn add_context(
        &mut self,
        folder: &Path,
        descriptor: Option<&Path>,
        disposition: &FolderDisposition,
        options: &AnalysisOptions,
    ) -> Arc<dyn AnalysisDriver>;

    /// A batch delta for the context rooted at `folder`.
    fn apply_changes(&mut self, folder: &Path, changes: &ChangeSet);

    /// A single source file left the context rooted at `folder`.
    fn apply_file_removed(&mut self, folder: &Path, path: &Path);

    /// The context was destroyed. `flushed` lists files it owned that no
    /// surviving context claims.
    fn remove_context(&mut self, folder: &Path, flushed: Vec<PathBuf>);

    /// Compute analysis options for a context folder (the builder role).
    fn compute_options(&mut self, folder: &Path) -> AnalysisOptions {
        let _ = folder;
        AnalysisOptions::default()
    }

    /// Package resolution changed for `folder`; rebuild its source factory.
    fn rebuild_source_factory(&mut self, folder: &Path, disposition: &FolderDisposition) {
        let _ = (folder, disposition);
    }

    /// Every watch event, before the engine acts on it.
    fn broadcast_watch_event(&mut self, event: &WatchEvent) {
        let _ = event;
    }

    /// Every watch event, after the engine acted on it.
    fn after_watch_event(&mut self, event: &WatchEvent) {
        let _ = event;
    }

    /// The options of the context rooted at `folder` were refreshed.
    fn analysis_options_updated(&mut self, folder: &Path) {
        let _ = folder;
    }
}
