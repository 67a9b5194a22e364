//! Package-resolution strategy of a context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How package URIs resolve inside a context.
///
/// A pure value object: the tree engine only stores it and hands it to
/// the driver factory, so new strategies can be added without touching
/// the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FolderDisposition {
    /// Resolution comes from a parsed `.packages` file.
    PackagesFile {
        /// Absolute path of the descriptor
        path: PathBuf,
        /// Package name to library-folder path
        packages: BTreeMap<String, PathBuf>,
    },

    /// Standalone folder with no package resolution.
    NoPackage,
}

impl FolderDisposition {
    /// The descriptor the disposition was built from, when there is one.
    pub fn packages_path(&self) -> Option<&Path> {
        match self {
            FolderDisposition::PackagesFile { path, .. } => Some(path),
            FolderDisposition::NoPackage => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packages_path() {
        let disposition = FolderDisposition::PackagesFile {
            path: PathBuf::from("/a/.packages"),
            packages: BTreeMap::new(),
        };
        assert_eq!(disposition.packages_path(), Some(Path::new("/a/.packages")));
        assert_eq!(FolderDisposition::NoPackage.packages_path(), None);
    }

    #[test]
    fn test_serialization_tags_variants() {
        let json = serde_json::to_string(&FolderDisposition::NoPackage).unwrap();
        assert!(json.contains("NoPackage"));
    }
}
