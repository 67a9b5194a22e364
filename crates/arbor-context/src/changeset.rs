//! The atomic source delta delivered to a driver.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Added / changed / removed paths of one tree mutation.
///
/// The three lists are pairwise disjoint and duplicate-free: recording a
/// path in one list withdraws it from the others, so the last recorded
/// state of a path within one delta wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    added: Vec<PathBuf>,
    changed: Vec<PathBuf>,
    removed: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as added.
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        Self::withdraw(&mut self.changed, &path);
        Self::withdraw(&mut self.removed, &path);
        if !self.added.contains(&path) {
            self.added.push(path);
        }
    }

    /// Record `path` as changed.
    pub fn change(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        Self::withdraw(&mut self.added, &path);
        Self::withdraw(&mut self.removed, &path);
        if !self.changed.contains(&path) {
            self.changed.push(path);
        }
    }

    /// Record `path` as removed.
    pub fn remove(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        Self::withdraw(&mut self.added, &path);
        Self::withdraw(&mut self.changed, &path);
        if !self.removed.contains(&path) {
            self.removed.push(path);
        }
    }

    pub fn added(&self) -> &[PathBuf] {
        &self.added
    }

    pub fn changed(&self) -> &[PathBuf] {
        &self.changed
    }

    pub fn removed(&self) -> &[PathBuf] {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    fn withdraw(list: &mut Vec<PathBuf>, path: &Path) {
        list.retain(|p| p != path);
    }
}
