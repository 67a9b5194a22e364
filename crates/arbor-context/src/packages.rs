//! Parser for `.packages` descriptor files.
//!
//! The format is line-oriented: `name:uri` pairs, `#` comments, blank
//! lines. URIs are either `file:` URLs or paths relative to the folder
//! holding the descriptor. Malformed lines are skipped and reported so a
//! half-edited file never takes the whole context down.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result of parsing one `.packages` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagesFile {
    /// Package name to library-folder path.
    pub packages: BTreeMap<String, PathBuf>,
    /// Human-readable descriptions of skipped lines.
    pub issues: Vec<String>,
}

/// Parse descriptor `content`, resolving relative URIs against `base_dir`.
pub fn parse(content: &str, base_dir: &Path) -> PackagesFile {
    let mut out = PackagesFile::default();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, uri)) = line.split_once(':') else {
            out.issues
                .push(format!("line {}: missing ':' separator", index + 1));
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            out.issues
                .push(format!("line {}: empty package name", index + 1));
            continue;
        }
        let Some(folder) = resolve_uri(uri.trim(), base_dir) else {
            out.issues
                .push(format!("line {}: unsupported uri '{}'", index + 1, uri.trim()));
            continue;
        };
        out.packages.insert(name.to_string(), folder);
    }
    out
}

/// Turn a descriptor URI into an absolute folder path.
fn resolve_uri(uri: &str, base_dir: &Path) -> Option<PathBuf> {
    if uri.is_empty() {
        return None;
    }
    let path = if let Some(rest) = uri.strip_prefix("file://") {
        // file:///abs/path, with an empty authority component.
        PathBuf::from(rest)
    } else if uri.contains("://") {
        // Non-file schemes cannot name a local folder.
        return None;
    } else {
        base_dir.join(uri)
    };
    // Descriptor URIs conventionally end in '/'.
    let trimmed = path
        .to_str()
        .map(|s| PathBuf::from(s.trim_end_matches('/')))
        .unwrap_or(path);
    Some(trimmed)
}
