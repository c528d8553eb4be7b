//! Harness configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Name of the watched directory when none is configured, relative to the working directory
pub const DEFAULT_SOURCE_DIR: &str = "plugins";

/// Top-level harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub workspace: WorkspaceConfig,
    pub compiler: CompilerConfig,
    pub schedule: ScheduleConfig,
    pub retention: RetentionConfig,
}

impl HarnessConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set workspace configuration
    pub fn with_workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    /// Set compiler configuration
    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    /// Set schedule configuration
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set retention configuration
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }
}

/// What to remove when the workspace is torn down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Remove the watched source directory
    #[default]
    Source,
    /// Remove the scratch directory
    Scratch,
    /// Remove both directories
    Both,
    /// Leave everything in place
    Keep,
}

impl TeardownPolicy {
    pub fn removes_source(&self) -> bool {
        matches!(self, Self::Source | Self::Both)
    }

    pub fn removes_scratch(&self) -> bool {
        matches!(self, Self::Scratch | Self::Both)
    }
}

impl fmt::Display for TeardownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Source => "source",
            Self::Scratch => "scratch",
            Self::Both => "both",
            Self::Keep => "keep",
        };
        f.write_str(s)
    }
}

impl FromStr for TeardownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "scratch" => Ok(Self::Scratch),
            "both" => Ok(Self::Both),
            "keep" => Ok(Self::Keep),
            other => Err(format!(
                "invalid teardown policy '{}', expected one of: source, scratch, both, keep",
                other
            )),
        }
    }
}

/// Workspace configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding plugin sources; `<cwd>/plugins` when unset
    pub source_dir: Option<PathBuf>,
    /// Teardown policy
    pub teardown: TeardownPolicy,
}

impl WorkspaceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the watched source directory
    pub fn with_source_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    /// Set teardown policy
    pub fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }
}

/// External toolchain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler executable, resolved through `PATH`
    pub program: String,
    /// Rust edition passed to the compiler
    pub edition: String,
    /// Extra arguments appended after the input path
    pub extra_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "rustc".to_string(),
            edition: "2021".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compiler executable
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Set edition
    pub fn with_edition(mut self, edition: &str) -> Self {
        self.edition = edition.to_string();
        self
    }

    /// Append an extra compiler argument
    pub fn with_arg(mut self, arg: &str) -> Self {
        self.extra_args.push(arg.to_string());
        self
    }
}

/// How the poll loop paces its iterations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollSchedule {
    /// Start the next iteration immediately
    #[default]
    Busy,
    /// Sleep a fixed interval between iterations
    Interval,
    /// Wait for a file system event in the source directory
    OnChange,
}

impl fmt::Display for PollSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Busy => "busy",
            Self::Interval => "interval",
            Self::OnChange => "on-change",
        };
        f.write_str(s)
    }
}

impl FromStr for PollSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "busy" => Ok(Self::Busy),
            "interval" => Ok(Self::Interval),
            "on-change" | "on_change" => Ok(Self::OnChange),
            other => Err(format!(
                "invalid schedule '{}', expected one of: busy, interval, on-change",
                other
            )),
        }
    }
}

/// Poll scheduling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: PollSchedule,
    /// Sleep for `interval`, re-scan timeout for `on-change`
    pub interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: PollSchedule::Busy,
            interval_ms: 1000,
        }
    }
}

impl ScheduleConfig {
    pub fn new(mode: PollSchedule) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set interval in milliseconds
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Loaded module retention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep every loaded module for the life of the process
    #[default]
    RetainAll,
    /// Keep only the most recent `n` modules, closing older ones
    KeepLast(usize),
}

/// Retention configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Bound on retained modules; unbounded when unset
    pub keep_last: Option<usize>,
}

impl RetentionConfig {
    pub fn keep_last(n: usize) -> Self {
        Self { keep_last: Some(n) }
    }

    pub fn policy(&self) -> RetentionPolicy {
        match self.keep_last {
            Some(n) => RetentionPolicy::KeepLast(n),
            None => RetentionPolicy::RetainAll,
        }
    }
}
