//! Engine error types.

use arbor_resource::ResourceError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the context engine.
#[derive(Debug, Error)]
pub enum ContextError {
    /// An included analysis root exists but is not a directory.
    #[error("analysis root is not a directory: {0}")]
    UnsupportedRootKind(PathBuf),

    /// Resource provider failure
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type Result<T> = std::result::Result<T, ContextError>;
