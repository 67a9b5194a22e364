//! Descriptor re-analysis.
//!
//! Each descriptor kind gets its own validator; the engine re-runs the
//! matching one after every watch event touching the file and replaces
//! that file's diagnostics wholesale. A validator that fails is
//! swallowed: the file's diagnostics reset to empty and everything else
//! proceeds.

use crate::diagnostics::AnalysisError;
use crate::packages;
use std::path::Path;
use thiserror::Error;

/// A validator gave up instead of producing diagnostics.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator failed: {0}")]
    Failed(String),
}

/// Produces diagnostics for one descriptor file.
pub trait DescriptorValidator: Send {
    fn validate(&self, path: &Path, content: &str) -> Result<Vec<AnalysisError>, ValidatorError>;
}

/// Checks that a YAML descriptor parses at all.
#[derive(Debug, Default)]
pub struct YamlValidator;

impl DescriptorValidator for YamlValidator {
    fn validate(&self, _path: &Path, content: &str) -> Result<Vec<AnalysisError>, ValidatorError> {
        match serde_yaml::from_str::<serde_yaml::Value>(content) {
            Ok(_) => Ok(Vec::new()),
            Err(e) => Ok(vec![AnalysisError::error(e.to_string())]),
        }
    }
}

/// Reports malformed lines of a `.packages` file.
#[derive(Debug, Default)]
pub struct PackagesValidator;

impl DescriptorValidator for PackagesValidator {
    fn validate(&self, path: &Path, content: &str) -> Result<Vec<AnalysisError>, ValidatorError> {
        let base = path.parent().unwrap_or(Path::new("/"));
        let parsed = packages::parse(content, base);
        Ok(parsed
            .issues
            .into_iter()
            .map(AnalysisError::warning)
            .collect())
    }
}

/// Accepts any content.
#[derive(Debug, Default)]
pub struct AcceptingValidator;

impl DescriptorValidator for AcceptingValidator {
    fn validate(&self, _path: &Path, _content: &str) -> Result<Vec<AnalysisError>, ValidatorError> {
        Ok(Vec::new())
    }
}

/// The validators the engine dispatches to, one per descriptor kind.
pub struct ValidatorSet {
    pub pubspec: Box<dyn DescriptorValidator>,
    pub packages: Box<dyn DescriptorValidator>,
    pub options: Box<dyn DescriptorValidator>,
    pub fix_data: Box<dyn DescriptorValidator>,
    pub manifest: Box<dyn DescriptorValidator>,
}

impl Default for ValidatorSet {
    fn default() -> Self {
        Self {
            pubspec: Box::new(YamlValidator),
            packages: Box::new(PackagesValidator),
            options: Box::new(YamlValidator),
            fix_data: Box::new(AcceptingValidator),
            manifest: Box::new(AcceptingValidator),
        }
    }
}
