//! hotswap plugins
//!
//! Watches a directory of Rust plugin sources and, on every poll iteration,
//! compiles each one into a `cdylib`, loads it and calls its `Run` entry point.
//! See [`hotswap_kernel::abi`] for the contract a plugin has to export.

pub mod hot_reload;

pub use hot_reload::{HarnessError, Poller, Workspace, WorkspaceError};
