//! Path containment and normalisation helpers.
//!
//! All paths handled by the engine are absolute and already normalised;
//! these helpers only compare and slice them, they never touch the disk.

use std::path::{Component, Path, PathBuf};

/// True iff `path` equals `ancestor` or lies below it, component-wise.
pub fn is_within(ancestor: &Path, path: &Path) -> bool {
    path.starts_with(ancestor)
}

/// True iff `path` lies strictly below `ancestor`.
pub fn contains_strictly(ancestor: &Path, path: &Path) -> bool {
    path != ancestor && path.starts_with(ancestor)
}

/// The part of `path` below `root`, or `None` when `path` is not inside it.
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Render a relative path with forward slashes for glob matching.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

/// True iff any *directory* component of `path` below `root` is dot-prefixed.
///
/// The final component is not considered, so dot-named files such as
/// `.packages` inside a visible folder are not caught by this rule.
pub fn is_in_dot_folder(root: &Path, path: &Path) -> bool {
    let Some(dir) = path.parent() else {
        return false;
    };
    let Some(rel) = relative_to(root, dir) else {
        return false;
    };
    rel.components().any(|c| match c {
        Component::Normal(part) => part.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// File or directory name of `path`, empty when it has none.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Number of components, used to order roots outermost-first.
pub fn depth(path: &Path) -> usize {
    path.components().count()
}
