//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of the context manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Globs selecting the files the engine attributes to contexts.
    #[serde(default = "default_analyzed_files")]
    pub analyzed_files: Vec<String>,

    /// Basenames recognised as the analysis-options file.
    #[serde(default = "default_options_file_names")]
    pub options_file_names: Vec<String>,

    /// Whether glob matching distinguishes case. Defaults to the
    /// platform's filesystem convention.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive_paths: bool,
}

fn default_analyzed_files() -> Vec<String> {
    vec!["**/*.dart".to_string()]
}

fn default_options_file_names() -> Vec<String> {
    vec![
        "analysis_options.yaml".to_string(),
        ".analysis_options".to_string(),
    ]
}

fn default_case_sensitive() -> bool {
    !cfg!(any(windows, target_os = "macos"))
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            analyzed_files: default_analyzed_files(),
            options_file_names: default_options_file_names(),
            case_sensitive_paths: default_case_sensitive(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a YAML file.
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// True iff `path`'s basename names an analysis-options file.
    pub fn is_options_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.options_file_names.iter().any(|o| o == name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.analyzed_files, vec!["**/*.dart"]);
        assert!(config.is_options_file(Path::new("/a/analysis_options.yaml")));
        assert!(config.is_options_file(Path::new("/a/.analysis_options")));
        assert!(!config.is_options_file(Path::new("/a/pubspec.yaml")));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ManagerConfig =
            serde_yaml::from_str("analyzed_files:\n  - \"**/*.dart\"\n  - \"**/*.htm\"\n").unwrap();
        assert_eq!(config.analyzed_files.len(), 2);
        assert_eq!(config.options_file_names, default_options_file_names());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ManagerConfig::load_from(&dir.path().join("gone.yaml")).is_err());
    }
}
