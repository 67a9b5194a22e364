//! The context manager: discovery, watch handling, and the public API.

use crate::changeset::ChangeSet;
use crate::config::ManagerConfig;
use crate::diagnostics::NotificationSink;
use crate::disposition::FolderDisposition;
use crate::driver::{AnalysisDriver, DriverFactory};
use crate::error::{ContextError, Result};
use crate::packages;
use crate::tree::{ContextId, ContextInfo, ContextTree};
use crate::validators::{DescriptorValidator, ValidatorSet};
use arbor_resource::{
    paths, ChangeKind, Resource, ResourceProvider, WatchEvent, WatchMessage, WatchSubscription,
};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const PUBSPEC_NAME: &str = "pubspec.yaml";
const PACKAGES_NAME: &str = ".packages";
const FIX_DATA_NAME: &str = "fix_data.yaml";
const MANIFEST_NAME: &str = "AndroidManifest.xml";
const DOC_DIR_NAME: &str = "doc";
const LIB_DIR_NAME: &str = "lib";

fn is_descriptor_name(name: &str) -> bool {
    name == PUBSPEC_NAME || name == PACKAGES_NAME
}

/// Which validator a descriptor path dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescriptorKind {
    Pubspec,
    Packages,
    Options,
    FixData,
    Manifest,
}

/// Maintains the live partition of the analysis roots into contexts.
///
/// All mutation happens on the caller's task: public operations and
/// watch-event deliveries are processed one at a time, and events are
/// consumed FIFO per root. Cross-root ordering is unspecified.
pub struct ContextManager {
    provider: Arc<dyn ResourceProvider>,
    factory: Box<dyn DriverFactory>,
    notifications: Box<dyn NotificationSink>,
    validators: ValidatorSet,
    config: ManagerConfig,
    analyzed: GlobSet,
    tree: ContextTree,
    included: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
    watchers: BTreeMap<PathBuf, WatchSubscription>,
}

impl ContextManager {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        factory: Box<dyn DriverFactory>,
        notifications: Box<dyn NotificationSink>,
        config: ManagerConfig,
    ) -> Self {
        let analyzed = compile_globs(&config.analyzed_files, config.case_sensitive_paths);
        Self {
            provider,
            factory,
            notifications,
            validators: ValidatorSet::default(),
            config,
            analyzed,
            tree: ContextTree::new(),
            included: Vec::new(),
            excluded: Vec::new(),
            watchers: BTreeMap::new(),
        }
    }

    /// Swap in non-default descriptor validators.
    pub fn with_validators(mut self, validators: ValidatorSet) -> Self {
        self.validators = validators;
        self
    }

    // ------------------------------------------------------------------
    // Public contract
    // ------------------------------------------------------------------

    /// Replace the configured roots. Idempotent: calling again with the
    /// same inputs leaves the tree untouched and emits nothing.
    pub fn set_roots(&mut self, included: &[PathBuf], excluded: &[PathBuf]) -> Result<()> {
        let mut kept: Vec<PathBuf> = Vec::new();
        for root in included {
            match self.provider.get_resource(root) {
                Resource::Folder => {
                    if !kept.contains(root) {
                        kept.push(root.clone());
                    }
                }
                Resource::Missing => {
                    // TODO: watch for the folder to appear and pick it up then.
                    warn!(root = ?root, "analysis root does not exist, dropping");
                }
                Resource::File => {
                    return Err(ContextError::UnsupportedRootKind(root.clone()));
                }
            }
        }
        // Outer roots first, so parents exist before anything nested.
        kept.sort_by(|a, b| paths::depth(a).cmp(&paths::depth(b)).then(a.cmp(b)));

        let mut new_excluded: Vec<PathBuf> = Vec::new();
        for path in excluded {
            if !new_excluded.contains(path) {
                new_excluded.push(path.clone());
            }
        }

        info!(
            included = kept.len(),
            excluded = new_excluded.len(),
            "replacing analysis roots"
        );

        let prev_excluded = std::mem::replace(&mut self.excluded, new_excluded.clone());

        // Contexts whose root is no longer included are obsolete.
        for (id, folder) in self.top_level_contexts() {
            let covered = kept.iter().any(|inc| paths::is_within(inc, &folder));
            if !covered {
                self.destroy_context(id);
            }
        }
        self.watchers.retain(|root, _| kept.contains(root));

        let newly_excluded: Vec<PathBuf> = new_excluded
            .iter()
            .filter(|p| !prev_excluded.contains(*p))
            .cloned()
            .collect();
        let newly_unexcluded: Vec<PathBuf> = prev_excluded
            .iter()
            .filter(|p| !new_excluded.contains(*p))
            .cloned()
            .collect();

        // So are contexts that a new exclusion now covers.
        if !newly_excluded.is_empty() {
            let doomed: Vec<ContextId> = self
                .tree
                .contexts()
                .into_iter()
                .filter(|id| {
                    self.tree
                        .folder(*id)
                        .map(|f| newly_excluded.iter().any(|e| paths::is_within(e, f)))
                        .unwrap_or(false)
                })
                .collect();
            for id in doomed {
                // A destroyed ancestor takes its subtree with it.
                if self.tree.get(id).is_some() {
                    self.destroy_context(id);
                }
            }
        }

        // First pass: strip sources the new exclusions cover. Second
        // pass: rescan what the new roots un-exclude. Separate and in
        // this order so no path is ever counted twice.
        if !newly_excluded.is_empty() {
            self.strip_excluded_sources(&newly_excluded);
        }
        for path in newly_unexcluded {
            self.rescan_unexcluded(&path);
        }

        // Discover contexts for roots not already managed.
        for inc in kept.clone() {
            if self.tree.innermost_containing(&inc).is_some() {
                continue;
            }
            if !self.watchers.contains_key(&inc) {
                match self.provider.watch(&inc) {
                    Ok(sub) => {
                        self.watchers.insert(inc.clone(), sub);
                    }
                    Err(e) => {
                        warn!(root = ?inc, error = %e, "failed to watch analysis root");
                    }
                }
            }
            let root = self.tree.root();
            self.create_context(root, inc);
        }

        self.included = kept;
        Ok(())
    }

    /// Destroy every context intersecting `roots` (all of them for
    /// `None`) and rebuild from the last configured inputs. The coarse
    /// recovery for watcher overflow.
    pub fn refresh(&mut self, roots: Option<&[PathBuf]>) -> Result<()> {
        info!("refreshing analysis roots");
        for (id, folder) in self.top_level_contexts() {
            let hit = match roots {
                None => true,
                Some(rs) => rs
                    .iter()
                    .any(|r| paths::is_within(r, &folder) || paths::is_within(&folder, r)),
            };
            if hit {
                self.destroy_context(id);
            }
        }
        let included = std::mem::take(&mut self.included);
        let excluded = std::mem::take(&mut self.excluded);
        self.set_roots(&included, &excluded)
    }

    /// The driver of the innermost context containing `path`.
    pub fn driver_for(&self, path: &Path) -> Option<Arc<dyn AnalysisDriver>> {
        self.tree
            .innermost_containing(path)
            .and_then(|id| self.tree.info(id).driver.clone())
    }

    /// Drivers of every context rooted at or under `folder`.
    pub fn drivers_in_root(&self, folder: &Path) -> Vec<Arc<dyn AnalysisDriver>> {
        self.tree
            .contexts()
            .into_iter()
            .filter(|id| {
                self.tree
                    .folder(*id)
                    .map(|f| paths::is_within(folder, f))
                    .unwrap_or(false)
            })
            .filter_map(|id| self.tree.info(id).driver.clone())
            .collect()
    }

    /// True iff `path` is inside an included folder and not excluded.
    pub fn is_in_analysis_root(&self, path: &Path) -> bool {
        self.included.iter().any(|inc| paths::is_within(inc, path)) && !self.is_excluded(path)
    }

    /// True iff any context on the containment chain ignores `path`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.tree
            .chain_containing(path)
            .iter()
            .any(|id| self.tree.info(*id).path_filter.ignored(path))
    }

    /// Read access to the context tree, for embedders and assertions.
    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }

    pub fn included_roots(&self) -> &[PathBuf] {
        &self.included
    }

    pub fn excluded_paths(&self) -> &[PathBuf] {
        &self.excluded
    }

    /// Folders of all live contexts, sorted.
    pub fn context_folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<PathBuf> = self
            .tree
            .contexts()
            .into_iter()
            .filter_map(|id| self.tree.folder(id).map(Path::to_path_buf))
            .collect();
        folders.sort();
        folders
    }

    /// The source set of the context rooted exactly at `folder`.
    pub fn sources_of(&self, folder: &Path) -> Option<BTreeSet<PathBuf>> {
        let id = self.tree.context_at(folder)?;
        Some(self.tree.info(id).sources.keys().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Watch events
    // ------------------------------------------------------------------

    /// Drain every pending watch message, FIFO per root. A watcher
    /// overflow aborts draining and rebuilds everything.
    pub fn process_pending(&mut self) {
        let roots: Vec<PathBuf> = self.watchers.keys().cloned().collect();
        let mut overflow = false;
        for root in roots {
            loop {
                let message = match self.watchers.get_mut(&root) {
                    Some(sub) => sub.try_next(),
                    None => break,
                };
                match message {
                    Some(WatchMessage::Event(event)) => self.handle_watch_event(&event),
                    Some(WatchMessage::Overflow(cause)) => {
                        warn!(root = ?root, cause = %cause, "watcher overflowed, rebuilding");
                        overflow = true;
                        break;
                    }
                    None => break,
                }
            }
        }
        if overflow {
            if let Err(e) = self.refresh(None) {
                error!(error = %e, "refresh after watcher overflow failed");
            }
        }
    }

    /// Feed one watch event through the state machine.
    pub fn handle_watch_event(&mut self, event: &WatchEvent) {
        self.factory.broadcast_watch_event(event);
        self.apply_watch_event(event);
        self.factory.after_watch_event(event);
    }

    fn apply_watch_event(&mut self, event: &WatchEvent) {
        let path = &event.path;
        let Some(id) = self.tree.innermost_containing(path) else {
            return;
        };
        debug!(path = ?path, kind = ?event.kind, "watch event");

        // Dependency changes recompute resolution no matter what the
        // filters below decide.
        if self.tree.info(id).dependencies.contains(path.as_path()) {
            self.recompute_disposition(id);
        }
        if !self.manageable(id, path) {
            return;
        }
        match event.kind {
            ChangeKind::Created => self.on_path_added(id, path),
            ChangeKind::Deleted => self.on_path_removed(id, path),
            ChangeKind::Modified => self.on_path_modified(path),
        }
        self.run_descriptor_analyses(path);
    }

    fn on_path_added(&mut self, id: ContextId, path: &Path) {
        let name = paths::basename(path);
        if is_descriptor_name(&name) {
            let Some(dir) = path.parent().map(Path::to_path_buf) else {
                return;
            };
            if self.tree.folder(id) == Some(dir.as_path()) {
                // A descriptor landing in the owning folder is a
                // dependency change, already recomputed above.
            } else if self.tree.context_at(&dir).is_none()
                && !self.other_descriptor_present(&dir, &name)
            {
                self.extract_context(id, path);
            }
        } else if self.is_analyzed(path) && self.provider.is_file(path) {
            // The existence check drops Emacs-style broken symlinks.
            if !self.tree.info(id).sources.contains_key(path) {
                if let Some(driver) = self.tree.info(id).driver.clone() {
                    let handle = driver.add_file(path);
                    self.tree
                        .info_mut(id)
                        .sources
                        .insert(path.to_path_buf(), handle);
                    debug!(path = ?path, "source added");
                }
            }
        }
    }

    fn on_path_removed(&mut self, id: ContextId, path: &Path) {
        let name = paths::basename(path);
        if is_descriptor_name(&name) && self.tree.folder(id) == path.parent() {
            let top_level = self
                .tree
                .info(id)
                .parent
                .map(|p| self.tree.is_root(p))
                .unwrap_or(true);
            if top_level {
                return;
            }
            let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) else {
                return;
            };
            if self.find_descriptor(&folder).is_none() {
                self.merge_context(id);
            }
        } else if self.tree.info_mut(id).sources.remove(path).is_some() {
            if let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) {
                self.factory.apply_file_removed(&folder, path);
            }
            debug!(path = ?path, "source removed");
        }
    }

    fn on_path_modified(&mut self, path: &Path) {
        if !self.is_analyzed(path) {
            return;
        }
        // Content changes fan out to every driver: the file may be
        // depended upon across context boundaries.
        for id in self.tree.contexts() {
            if let Some(driver) = self.tree.info(id).driver.as_ref() {
                driver.change_file(path);
            }
        }
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    fn create_context(&mut self, parent: ContextId, folder: PathBuf) -> ContextId {
        let descriptor = self.find_descriptor(&folder);
        let disposition = self.compute_disposition(&folder);
        let options = self.factory.compute_options(&folder);
        let driver = self
            .factory
            .add_context(&folder, descriptor.as_deref(), &disposition, &options);

        let mut node = ContextInfo::new(&folder, self.config.case_sensitive_paths);
        node.path_filter.set_patterns(&options.exclude_patterns);
        node.descriptor_path = descriptor;
        node.disposition = disposition;
        node.dependencies = [folder.join(PACKAGES_NAME), folder.join(PUBSPEC_NAME)]
            .into_iter()
            .collect();
        node.driver = Some(driver);

        let id = self.tree.attach(parent, node);
        info!(folder = ?folder, "analysis context created");

        // Contexts that already live inside this folder become part of
        // the new subtree before any scanning, so they keep their files.
        self.adopt_contained_contexts(id);
        self.discover_child_contexts(id, &folder);
        self.scan_context_sources(id);
        id
    }

    /// Re-parent every existing context whose folder lies strictly
    /// inside `id`'s folder but is not yet in `id`'s subtree.
    fn adopt_contained_contexts(&mut self, id: ContextId) {
        let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) else {
            return;
        };
        let mut strays: Vec<(ContextId, PathBuf)> = self
            .tree
            .contexts()
            .into_iter()
            .filter(|c| *c != id)
            .filter_map(|c| self.tree.folder(c).map(|f| (c, f.to_path_buf())))
            .filter(|(c, f)| paths::contains_strictly(&folder, f) && !self.in_subtree(id, *c))
            .collect();
        // Outermost first, so nesting order is preserved.
        strays.sort_by(|a, b| paths::depth(&a.1).cmp(&paths::depth(&b.1)).then(a.1.cmp(&b.1)));
        for (stray, stray_folder) in strays {
            if self.in_subtree(id, stray) {
                continue;
            }
            let attach = self.attach_point(id, &stray_folder, stray);
            self.tree.reparent(stray, attach);
            debug!(folder = ?stray_folder, "context re-parented");
        }
    }

    fn in_subtree(&self, root: ContextId, id: ContextId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == root {
                return true;
            }
            current = self.tree.info(c).parent;
        }
        false
    }

    /// Deepest node under `start` whose folder contains `folder`, never
    /// descending into `skip`.
    fn attach_point(&self, start: ContextId, folder: &Path, skip: ContextId) -> ContextId {
        let mut current = start;
        loop {
            let next = self
                .tree
                .info(current)
                .children
                .iter()
                .copied()
                .filter(|c| *c != skip)
                .find(|c| {
                    self.tree
                        .folder(*c)
                        .map(|f| paths::is_within(f, folder))
                        .unwrap_or(false)
                });
            match next {
                Some(c) => current = c,
                None => return current,
            }
        }
    }

    fn discover_child_contexts(&mut self, ctx: ContextId, dir: &Path) {
        let Some(ctx_folder) = self.tree.folder(ctx).map(Path::to_path_buf) else {
            return;
        };
        let top_level = dir == ctx_folder;
        // A folder that vanished between enumeration and read is empty.
        let Ok(entries) = self.provider.list_dir(dir) else {
            return;
        };
        for entry in entries {
            if !entry.is_dir {
                continue;
            }
            let name = paths::basename(&entry.path);
            if name.starts_with('.') {
                continue;
            }
            if top_level && name == DOC_DIR_NAME {
                continue;
            }
            if self.is_excluded(&entry.path) {
                continue;
            }
            if self.tree.info(ctx).path_filter.ignored(&entry.path) {
                continue;
            }
            if self.tree.context_at(&entry.path).is_some() {
                continue;
            }
            if self.find_descriptor(&entry.path).is_some() {
                self.create_context(ctx, entry.path);
            } else {
                self.discover_child_contexts(ctx, &entry.path);
            }
        }
    }

    /// Attribute every analysable file in the context's territory and
    /// emit the resulting delta.
    fn scan_context_sources(&mut self, ctx: ContextId) {
        let Some(folder) = self.tree.folder(ctx).map(Path::to_path_buf) else {
            return;
        };
        let mut found = Vec::new();
        self.collect_sources(ctx, &folder, &mut found);
        if found.is_empty() {
            return;
        }
        let driver = self.tree.info(ctx).driver.clone();
        let mut cs = ChangeSet::new();
        for path in found {
            let Some(driver) = driver.as_ref() else {
                continue;
            };
            let handle = driver.add_file(&path);
            self.tree.info_mut(ctx).sources.insert(path.clone(), handle);
            cs.add(path);
        }
        debug!(folder = ?folder, added = cs.added().len(), "sources attributed");
        self.factory.apply_changes(&folder, &cs);
    }

    fn collect_sources(&self, ctx: ContextId, dir: &Path, out: &mut Vec<PathBuf>) {
        let Some(ctx_folder) = self.tree.folder(ctx) else {
            return;
        };
        let top_level = dir == ctx_folder;
        let Ok(entries) = self.provider.list_dir(dir) else {
            return;
        };
        for entry in entries {
            if self.is_excluded(&entry.path) {
                continue;
            }
            if self.tree.info(ctx).path_filter.ignored(&entry.path) {
                continue;
            }
            if entry.is_dir {
                let name = paths::basename(&entry.path);
                if name.starts_with('.') {
                    continue;
                }
                if top_level && name == DOC_DIR_NAME {
                    continue;
                }
                if self.tree.excludes(ctx, &entry.path) {
                    continue;
                }
                self.collect_sources(ctx, &entry.path, out);
            } else {
                // Dot-named files are fine; only dot folders hide content.
                if paths::is_in_dot_folder(ctx_folder, &entry.path) {
                    continue;
                }
                if self.is_analyzed(&entry.path) && self.provider.is_file(&entry.path) {
                    out.push(entry.path);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Split and merge
    // ------------------------------------------------------------------

    /// A descriptor appeared in a folder the owning context does not
    /// root: carve that folder out into a context of its own.
    fn extract_context(&mut self, old_id: ContextId, descriptor_path: &Path) {
        let Some(folder) = descriptor_path.parent().map(Path::to_path_buf) else {
            return;
        };
        let Some(old_folder) = self.tree.folder(old_id).map(Path::to_path_buf) else {
            return;
        };

        // The old owner gives up everything under the new folder first,
        // so the new context's scan is the only 'added' emission.
        let moved: Vec<PathBuf> = self
            .tree
            .info(old_id)
            .sources
            .keys()
            .filter(|p| paths::is_within(&folder, p))
            .cloned()
            .collect();
        if !moved.is_empty() {
            let mut cs = ChangeSet::new();
            let node = self.tree.info_mut(old_id);
            for path in &moved {
                node.sources.remove(path);
                cs.remove(path.clone());
            }
            self.factory.apply_changes(&old_folder, &cs);
        }

        info!(folder = ?folder, from = ?old_folder, "extracting context");
        self.create_context(old_id, folder);
    }

    /// The last descriptor of a nested context vanished: its folder
    /// returns to the parent.
    fn merge_context(&mut self, id: ContextId) {
        let Some(parent) = self.tree.info(id).parent else {
            return;
        };
        if self.tree.is_root(parent) {
            return;
        }
        let Some(parent_folder) = self.tree.folder(parent).map(Path::to_path_buf) else {
            return;
        };

        // Nested contexts survive the merge; they move up one level.
        let children: Vec<ContextId> = self.tree.info(id).children.clone();
        for child in children {
            self.tree.reparent(child, parent);
        }

        let node = self.tree.remove(id);
        let Some(folder) = node.folder else {
            return;
        };

        let mut transferred: Vec<PathBuf> = Vec::new();
        let mut flushed: Vec<PathBuf> = Vec::new();
        for (path, _) in node.sources {
            if self.manageable(parent, &path) {
                transferred.push(path);
            } else {
                flushed.push(path);
            }
        }
        transferred.sort();
        flushed.sort();

        info!(folder = ?folder, into = ?parent_folder, "merging context into parent");
        self.factory.remove_context(&folder, flushed);

        if !transferred.is_empty() {
            let driver = self.tree.info(parent).driver.clone();
            let mut cs = ChangeSet::new();
            for path in transferred {
                if let Some(driver) = driver.as_ref() {
                    let handle = driver.add_file(&path);
                    self.tree
                        .info_mut(parent)
                        .sources
                        .insert(path.clone(), handle);
                }
                cs.add(path);
            }
            self.factory.apply_changes(&parent_folder, &cs);
        }
    }

    fn destroy_context(&mut self, id: ContextId) {
        let children: Vec<ContextId> = self.tree.info(id).children.clone();
        for child in children {
            self.destroy_context(child);
        }
        let node = self.tree.remove(id);
        if let Some(folder) = node.folder {
            self.watchers.remove(&folder);
            let mut flushed: Vec<PathBuf> = node.sources.into_keys().collect();
            flushed.sort();
            info!(folder = ?folder, flushed = flushed.len(), "analysis context destroyed");
            self.factory.remove_context(&folder, flushed);
        }
    }

    // ------------------------------------------------------------------
    // Exclusion transitions
    // ------------------------------------------------------------------

    fn strip_excluded_sources(&mut self, newly_excluded: &[PathBuf]) {
        for id in self.tree.contexts() {
            let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) else {
                continue;
            };
            let doomed: Vec<PathBuf> = self
                .tree
                .info(id)
                .sources
                .keys()
                .filter(|p| newly_excluded.iter().any(|e| paths::is_within(e, p)))
                .cloned()
                .collect();
            if doomed.is_empty() {
                continue;
            }
            let mut cs = ChangeSet::new();
            let node = self.tree.info_mut(id);
            for path in &doomed {
                node.sources.remove(path);
                cs.remove(path.clone());
            }
            debug!(folder = ?folder, removed = doomed.len(), "sources excluded");
            self.factory.apply_changes(&folder, &cs);
        }
    }

    fn rescan_unexcluded(&mut self, path: &Path) {
        if self.is_excluded(path) {
            return;
        }
        let Some(owner) = self.tree.innermost_containing(path) else {
            return;
        };
        if self.provider.is_dir(path) {
            // A descriptor hidden by the old exclusion founds a context
            // of its own now.
            if self.tree.context_at(path).is_none() && self.find_descriptor(path).is_some() {
                self.create_context(owner, path.to_path_buf());
                return;
            }
            self.discover_child_contexts(owner, path);
            self.scan_into_contexts(path);
        } else if self.provider.is_file(path) {
            self.add_single_source(path);
        }
    }

    /// Scan `dir` attributing each visible file to its innermost owner,
    /// batching one delta per touched context.
    fn scan_into_contexts(&mut self, dir: &Path) {
        let mut found: BTreeMap<ContextId, Vec<PathBuf>> = BTreeMap::new();
        self.collect_into_contexts(dir, &mut found);
        for (ctx, files) in found {
            let Some(folder) = self.tree.folder(ctx).map(Path::to_path_buf) else {
                continue;
            };
            let driver = self.tree.info(ctx).driver.clone();
            let mut cs = ChangeSet::new();
            for path in files {
                if self.tree.info(ctx).sources.contains_key(&path) {
                    continue;
                }
                let Some(driver) = driver.as_ref() else {
                    continue;
                };
                let handle = driver.add_file(&path);
                self.tree.info_mut(ctx).sources.insert(path.clone(), handle);
                cs.add(path);
            }
            if !cs.is_empty() {
                self.factory.apply_changes(&folder, &cs);
            }
        }
    }

    fn collect_into_contexts(&self, dir: &Path, out: &mut BTreeMap<ContextId, Vec<PathBuf>>) {
        let Ok(entries) = self.provider.list_dir(dir) else {
            return;
        };
        for entry in entries {
            if self.is_excluded(&entry.path) {
                continue;
            }
            if entry.is_dir {
                if paths::basename(&entry.path).starts_with('.') {
                    continue;
                }
                // A context rooted here scanned itself at creation.
                if self.tree.context_at(&entry.path).is_some() {
                    continue;
                }
                self.collect_into_contexts(&entry.path, out);
            } else {
                let Some(owner) = self.tree.innermost_containing(&entry.path) else {
                    continue;
                };
                // `manageable` applies the dot-folder rule to files.
                if !self.manageable(owner, &entry.path) {
                    continue;
                }
                if self.is_analyzed(&entry.path) && self.provider.is_file(&entry.path) {
                    out.entry(owner).or_default().push(entry.path);
                }
            }
        }
    }

    fn add_single_source(&mut self, path: &Path) {
        let Some(owner) = self.tree.innermost_containing(path) else {
            return;
        };
        if !self.manageable(owner, path) {
            return;
        }
        if !self.is_analyzed(path) || !self.provider.is_file(path) {
            return;
        }
        if self.tree.info(owner).sources.contains_key(path) {
            return;
        }
        let Some(folder) = self.tree.folder(owner).map(Path::to_path_buf) else {
            return;
        };
        let Some(driver) = self.tree.info(owner).driver.clone() else {
            return;
        };
        let handle = driver.add_file(path);
        self.tree
            .info_mut(owner)
            .sources
            .insert(path.to_path_buf(), handle);
        let mut cs = ChangeSet::new();
        cs.add(path.to_path_buf());
        self.factory.apply_changes(&folder, &cs);
    }

    // ------------------------------------------------------------------
    // Disposition and re-analysis
    // ------------------------------------------------------------------

    fn recompute_disposition(&mut self, id: ContextId) {
        let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) else {
            return;
        };
        let descriptor = self.find_descriptor(&folder);
        let disposition = self.compute_disposition(&folder);
        debug!(folder = ?folder, "package resolution recomputed");
        self.factory.rebuild_source_factory(&folder, &disposition);
        let node = self.tree.info_mut(id);
        node.descriptor_path = descriptor;
        node.disposition = disposition;
        node.dependencies = [folder.join(PACKAGES_NAME), folder.join(PUBSPEC_NAME)]
            .into_iter()
            .collect();
    }

    fn run_descriptor_analyses(&mut self, path: &Path) {
        let Some(id) = self.tree.innermost_containing(path) else {
            return;
        };
        let name = paths::basename(path);
        let kind = if name == PUBSPEC_NAME {
            Some(DescriptorKind::Pubspec)
        } else if name == PACKAGES_NAME {
            Some(DescriptorKind::Packages)
        } else if self.config.is_options_file(path) {
            Some(DescriptorKind::Options)
        } else if name == FIX_DATA_NAME && self.is_lib_fix_data(id, path) {
            Some(DescriptorKind::FixData)
        } else if name == MANIFEST_NAME {
            Some(DescriptorKind::Manifest)
        } else {
            None
        };
        let Some(kind) = kind else {
            return;
        };
        self.revalidate(kind, path);
        if matches!(
            kind,
            DescriptorKind::Pubspec | DescriptorKind::Packages | DescriptorKind::Options
        ) {
            self.update_analysis_options(id);
        }
    }

    fn is_lib_fix_data(&self, id: ContextId, path: &Path) -> bool {
        self.tree
            .folder(id)
            .map(|f| path.parent() == Some(f.join(LIB_DIR_NAME).as_path()))
            .unwrap_or(false)
    }

    fn revalidate(&mut self, kind: DescriptorKind, path: &Path) {
        let content = match self.provider.read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                // Unreadable or gone: clear stale diagnostics.
                self.notifications.record_analysis_errors(path, &[]);
                return;
            }
        };
        let result = {
            let validator: &dyn DescriptorValidator = match kind {
                DescriptorKind::Pubspec => self.validators.pubspec.as_ref(),
                DescriptorKind::Packages => self.validators.packages.as_ref(),
                DescriptorKind::Options => self.validators.options.as_ref(),
                DescriptorKind::FixData => self.validators.fix_data.as_ref(),
                DescriptorKind::Manifest => self.validators.manifest.as_ref(),
            };
            validator.validate(path, &content)
        };
        match result {
            Ok(errors) => self.notifications.record_analysis_errors(path, &errors),
            Err(e) => {
                warn!(path = ?path, error = %e, "descriptor validator failed");
                self.notifications.record_analysis_errors(path, &[]);
            }
        }
    }

    fn update_analysis_options(&mut self, id: ContextId) {
        let Some(folder) = self.tree.folder(id).map(Path::to_path_buf) else {
            return;
        };
        let options = self.factory.compute_options(&folder);
        self.tree
            .info_mut(id)
            .path_filter
            .set_patterns(&options.exclude_patterns);
        if let Some(driver) = self.tree.info(id).driver.clone() {
            driver.configure(&options, &self.tree.info(id).disposition);
        }
        self.factory.analysis_options_updated(&folder);
        debug!(folder = ?folder, "analysis options updated");
    }

    // ------------------------------------------------------------------
    // Predicates and helpers
    // ------------------------------------------------------------------

    fn top_level_contexts(&self) -> Vec<(ContextId, PathBuf)> {
        let root = self.tree.root();
        self.tree
            .info(root)
            .children
            .iter()
            .filter_map(|id| self.tree.folder(*id).map(|f| (*id, f.to_path_buf())))
            .collect()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|e| paths::is_within(e, path))
    }

    fn is_analyzed(&self, path: &Path) -> bool {
        self.analyzed.is_match(paths::to_slash(path))
    }

    /// The composed drop filter of the watch-event machine: a path the
    /// context does not manage is not acted upon.
    fn manageable(&self, id: ContextId, path: &Path) -> bool {
        let Some(folder) = self.tree.folder(id) else {
            return false;
        };
        !self.is_excluded(path)
            && !paths::is_in_dot_folder(folder, path)
            && !paths::is_within(&folder.join(DOC_DIR_NAME), path)
            && !self.tree.excludes(id, path)
            && !self.tree.info(id).path_filter.ignored(path)
    }

    fn find_descriptor(&self, folder: &Path) -> Option<PathBuf> {
        let packages = folder.join(PACKAGES_NAME);
        if self.provider.is_file(&packages) {
            return Some(packages);
        }
        let pubspec = folder.join(PUBSPEC_NAME);
        if self.provider.is_file(&pubspec) {
            return Some(pubspec);
        }
        None
    }

    fn compute_disposition(&mut self, folder: &Path) -> FolderDisposition {
        let packages_path = folder.join(PACKAGES_NAME);
        if !self.provider.is_file(&packages_path) {
            return FolderDisposition::NoPackage;
        }
        match self.provider.read_to_string(&packages_path) {
            Ok(content) => {
                let parsed = packages::parse(&content, folder);
                FolderDisposition::PackagesFile {
                    path: packages_path,
                    packages: parsed.packages,
                }
            }
            Err(e) => {
                warn!(path = ?packages_path, error = %e, "failed to read package descriptor");
                self.notifications.record_analysis_errors(&packages_path, &[]);
                FolderDisposition::NoPackage
            }
        }
    }

    fn other_descriptor_present(&self, dir: &Path, added_name: &str) -> bool {
        let other = if added_name == PACKAGES_NAME {
            PUBSPEC_NAME
        } else {
            PACKAGES_NAME
        };
        self.provider.is_file(&dir.join(other))
    }
}

fn compile_globs(patterns: &[String], case_sensitive: bool) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "skipping invalid analyzed-files glob");
            }
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "analyzed-files glob set failed to build");
        GlobSet::empty()
    })
}
