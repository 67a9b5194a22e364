//! Filesystem abstraction for the Arbor context engine.
//!
//! Everything the engine learns about the workspace flows through the
//! [`ResourceProvider`] trait: directory listings, file contents, and the
//! per-root watch-event streams. Two providers ship here: a std-fs backed
//! one with `notify` watchers, and an in-memory one whose mutations
//! synthesise watch events deterministically for tests.

mod fs;
mod memory;
pub mod paths;
mod provider;
mod watch;

pub use fs::StdResourceProvider;
pub use memory::MemoryResourceProvider;
pub use provider::{DirEntry, Resource, ResourceError, ResourceProvider};
pub use watch::{ChangeKind, WatchEvent, WatchMessage, WatchSubscription};
