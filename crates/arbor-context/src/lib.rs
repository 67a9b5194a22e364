//! Arbor context engine.
//!
//! Maintains a live, tree-structured partition of a workspace into
//! analysis contexts: one context per folder holding a package
//! descriptor, every source file owned by exactly one enclosing context.
//! Discovery walks the configured roots, a watch-event state machine
//! reshapes the tree incrementally, and each mutation is reported to the
//! embedding analysis server through the driver-factory seam.

mod changeset;
mod config;
mod diagnostics;
mod disposition;
mod driver;
mod error;
mod filter;
mod manager;
pub mod packages;
mod tree;
mod validators;

pub use changeset::ChangeSet;
pub use config::ManagerConfig;
pub use diagnostics::{AnalysisError, NotificationSink, NullNotificationSink, Severity};
pub use disposition::FolderDisposition;
pub use driver::{AnalysisDriver, AnalysisOptions, DriverFactory, SourceHandle};
pub use error::{ContextError, Result};
pub use filter::PathFilter;
pub use manager::ContextManager;
pub use tree::{ContextId, ContextInfo, ContextTree};
pub use validators::{DescriptorValidator, ValidatorError, ValidatorSet};
