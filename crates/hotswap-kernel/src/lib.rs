//! hotswap kernel
//!
//! Shared definitions for the hot-reload harness: the configuration model and
//! the entry-point ABI every plugin has to export.

// plugin ABI module
pub mod abi;

// config module
pub mod config;

pub use config::{
    CompilerConfig, HarnessConfig, PollSchedule, RetentionPolicy, ScheduleConfig, TeardownPolicy,
    WorkspaceConfig,
};
