//! Diagnostics produced by descriptor re-analysis.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// One diagnostic for a descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub message: String,
    pub severity: Severity,
}

impl AnalysisError {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Forwards diagnostics to the client.
///
/// Recording replaces whatever was previously recorded for the path, so
/// repeated calls for the same path are idempotent and an empty slice
/// clears stale diagnostics.
pub trait NotificationSink: Send {
    fn record_analysis_errors(&mut self, path: &Path, errors: &[AnalysisError]);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotificationSink;

impl NotificationSink for NullNotificationSink {
    fn record_analysis_errors(&mut self, _path: &Path, _errors: &[AnalysisError]) {}
}
