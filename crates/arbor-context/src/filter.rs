//! Per-context ignore globs.

use arbor_resource::paths;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Decides whether a path inside a context root is ignored by the
/// context's glob patterns.
///
/// Patterns are matched against the path relative to the root, with
/// forward-slash separators. Case sensitivity follows the filesystem the
/// provider was configured for.
#[derive(Debug)]
pub struct PathFilter {
    root: PathBuf,
    case_sensitive: bool,
    patterns: Vec<String>,
    set: GlobSet,
}

impl PathFilter {
    pub fn new(root: impl Into<PathBuf>, case_sensitive: bool) -> Self {
        Self {
            root: root.into(),
            case_sensitive,
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Replace the active patterns. Invalid globs are skipped, never fatal.
    pub fn set_patterns(&mut self, patterns: &[String]) {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match GlobBuilder::new(pattern)
                .case_insensitive(!self.case_sensitive)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "skipping invalid ignore glob");
                }
            }
        }
        self.set = match builder.build() {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "ignore glob set failed to build");
                GlobSet::empty()
            }
        };
        self.patterns = patterns.to_vec();
    }

    /// True iff `path` lies under the root and matches an ignore pattern.
    pub fn ignored(&self, path: &Path) -> bool {
        let Some(rel) = paths::relative_to(&self.root, path) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return false;
        }
        self.set.is_match(paths::to_slash(&rel))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
