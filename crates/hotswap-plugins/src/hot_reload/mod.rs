//! Hot-reload harness
//!
//! Provides the poll-compile-load-run cycle for plugin sources:
//! - Workspace management (watched sources, private scratch directory)
//! - Compiling sources into dynamic libraries under fresh names
//! - Loading libraries and calling their `Run` entry point
//! - Explicit retention of loaded modules
//! - Optional file system notifications instead of busy polling

mod arena;
mod compiler;
mod loader;
mod poller;
mod watcher;
mod workspace;

pub use arena::ModuleArena;
pub use compiler::{Artifact, CompileError, Compiler, OBJECT_EXTENSION};
pub use loader::{EntryPointLookup, LoadError, LoadedModule, Loader, resolve_entry_point};
pub use poller::{ArtifactGuard, FileFailure, HarnessError, IterationReport, Poller};
pub use watcher::SourceWatcher;
pub use workspace::{SOURCE_EXTENSION, Workspace, WorkspaceError, is_source_file};

// Re-export kernel definitions used by callers of the harness
pub use hotswap_kernel::{
    CompilerConfig, HarnessConfig, PollSchedule, RetentionPolicy, ScheduleConfig, TeardownPolicy,
    WorkspaceConfig,
};
