//! The context tree: an arena of nested folder intervals.
//!
//! Nodes reference each other by [`ContextId`] so parent/child links
//! never form owning cycles; the tree owns the arena. A distinguished
//! virtual root with no folder anchors the top-level contexts and is
//! never exposed through the manager's public API.

use crate::disposition::FolderDisposition;
use crate::driver::{AnalysisDriver, SourceHandle};
use crate::filter::PathFilter;
use arbor_resource::paths;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arena index of a context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

/// One node of the context tree.
pub struct ContextInfo {
    /// Absolute folder; `None` only for the virtual root.
    pub folder: Option<PathBuf>,
    /// Enclosing context; `None` only for the virtual root.
    pub parent: Option<ContextId>,
    /// Direct children, in creation order.
    pub children: Vec<ContextId>,
    /// The descriptor file that caused this context to exist.
    pub descriptor_path: Option<PathBuf>,
    /// Package-resolution strategy.
    pub disposition: FolderDisposition,
    /// Ignore globs rooted at `folder`.
    pub path_filter: PathFilter,
    /// Paths whose modification requires recomputing `disposition`.
    pub dependencies: BTreeSet<PathBuf>,
    /// Owned source files and their driver-issued handles.
    pub sources: HashMap<PathBuf, SourceHandle>,
    /// Driver bound to this node; `None` only for the virtual root.
    pub driver: Option<Arc<dyn AnalysisDriver>>,
}

impl ContextInfo {
    /// A fresh node for `folder` with empty state.
    pub fn new(folder: impl Into<PathBuf>, case_sensitive: bool) -> Self {
        let folder = folder.into();
        let path_filter = PathFilter::new(&folder, case_sensitive);
        Self {
            folder: Some(folder),
            parent: None,
            children: Vec::new(),
            descriptor_path: None,
            disposition: FolderDisposition::NoPackage,
            path_filter,
            dependencies: BTreeSet::new(),
            sources: HashMap::new(),
            driver: None,
        }
    }

    fn virtual_root() -> Self {
        Self {
            folder: None,
            parent: None,
            children: Vec::new(),
            descriptor_path: None,
            disposition: FolderDisposition::NoPackage,
            path_filter: PathFilter::new(PathBuf::new(), true),
            dependencies: BTreeSet::new(),
            sources: HashMap::new(),
            driver: None,
        }
    }
}

impl std::fmt::Debug for ContextInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextInfo")
            .field("folder", &self.folder)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("descriptor_path", &self.descriptor_path)
            .field("sources", &self.sources.len())
            .finish()
    }
}

/// Arena holding every context node.
pub struct ContextTree {
    nodes: HashMap<ContextId, ContextInfo>,
    root: ContextId,
    next: u32,
}

impl ContextTree {
    pub fn new() -> Self {
        let root = ContextId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, ContextInfo::virtual_root());
        Self {
            nodes,
            root,
            next: 1,
        }
    }

    /// The virtual root.
    pub fn root(&self) -> ContextId {
        self.root
    }

    pub fn is_root(&self, id: ContextId) -> bool {
        id == self.root
    }

    pub fn get(&self, id: ContextId) -> Option<&ContextInfo> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut ContextInfo> {
        self.nodes.get_mut(&id)
    }

    /// Infallible lookup; ids handed out by this tree stay valid until
    /// [`ContextTree::remove`].
    pub fn info(&self, id: ContextId) -> &ContextInfo {
        self.nodes.get(&id).expect("context node must exist")
    }

    pub fn info_mut(&mut self, id: ContextId) -> &mut ContextInfo {
        self.nodes.get_mut(&id).expect("context node must exist")
    }

    /// The node's folder; `None` for the virtual root.
    pub fn folder(&self, id: ContextId) -> Option<&Path> {
        self.info(id).folder.as_deref()
    }

    /// Insert `info` as the last child of `parent`.
    pub fn attach(&mut self, parent: ContextId, mut info: ContextInfo) -> ContextId {
        let id = ContextId(self.next);
        self.next += 1;
        info.parent = Some(parent);
        self.nodes.insert(id, info);
        self.info_mut(parent).children.push(id);
        id
    }

    /// Move `id` under `new_parent`, keeping its subtree intact.
    pub fn reparent(&mut self, id: ContextId, new_parent: ContextId) {
        if let Some(old_parent) = self.info(id).parent {
            self.info_mut(old_parent).children.retain(|c| *c != id);
        }
        self.info_mut(id).parent = Some(new_parent);
        self.info_mut(new_parent).children.push(id);
    }

    /// Detach and take a childless node out of the arena.
    pub fn remove(&mut self, id: ContextId) -> ContextInfo {
        debug_assert!(self.info(id).children.is_empty(), "remove leaves only");
        if let Some(parent) = self.info(id).parent {
            self.info_mut(parent).children.retain(|c| *c != id);
        }
        self.nodes.remove(&id).expect("context node must exist")
    }

    /// Transitive children of `id`, pre-order, not including `id`.
    pub fn descendants(&self, id: ContextId) -> Descendants<'_> {
        let mut stack: Vec<ContextId> = self.info(id).children.clone();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Every real context (the virtual root excluded), pre-order.
    pub fn contexts(&self) -> Vec<ContextId> {
        self.descendants(self.root).collect()
    }

    /// The unique child of `id` whose folder equals or contains `path`.
    pub fn find_child_containing(&self, id: ContextId, path: &Path) -> Option<ContextId> {
        self.info(id).children.iter().copied().find(|child| {
            self.folder(*child)
                .map(|f| paths::is_within(f, path))
                .unwrap_or(false)
        })
    }

    /// True iff a deeper context owns `path`.
    pub fn excludes(&self, id: ContextId, path: &Path) -> bool {
        self.find_child_containing(id, path).is_some()
    }

    /// True iff this node's folder contains `path`, no child claims it,
    /// and the node's filter does not ignore it.
    pub fn manages(&self, id: ContextId, path: &Path) -> bool {
        let info = self.info(id);
        let Some(folder) = info.folder.as_deref() else {
            return false;
        };
        paths::is_within(folder, path)
            && !self.excludes(id, path)
            && !info.path_filter.ignored(path)
    }

    /// The deepest context whose folder contains `path`.
    pub fn innermost_containing(&self, path: &Path) -> Option<ContextId> {
        let mut current = self.root;
        loop {
            match self.find_child_containing(current, path) {
                Some(child) => current = child,
                None => break,
            }
        }
        (current != self.root).then_some(current)
    }

    /// The context rooted exactly at `folder`, if any.
    pub fn context_at(&self, folder: &Path) -> Option<ContextId> {
        self.contexts()
            .into_iter()
            .find(|id| self.folder(*id) == Some(folder))
    }

    /// The chain of contexts from outermost to innermost containing
    /// `path`, the virtual root excluded.
    pub fn chain_containing(&self, path: &Path) -> Vec<ContextId> {
        let mut chain = Vec::new();
        let mut current = self.root;
        while let Some(child) = self.find_child_containing(current, path) {
            chain.push(child);
            current = child;
        }
        chain
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy pre-order walk over a subtree.
pub struct Descendants<'a> {
    tree: &'a ContextTree,
    stack: Vec<ContextId>,
}

impl Iterator for Descendants<'_> {
    type Item = ContextId;

    fn next(&mut self) -> Option<ContextId> {
        let id = self.stack.pop()?;
        let children = &self.tree.info(id).children;
        for child in children.iter().rev() {
            self.stack.push(*child);
        }
        Some(id)
    }
}
