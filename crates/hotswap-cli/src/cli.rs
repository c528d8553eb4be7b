//! CLI definitions using clap

use clap::Parser;
use hotswap_kernel::config::{ConfigResult, load_config};
use hotswap_kernel::{HarnessConfig, PollSchedule, RetentionPolicy, TeardownPolicy};
use std::path::PathBuf;

/// hotswap - compile, load and run every plugin in ./plugins, forever
///
/// With no arguments the harness watches `<cwd>/plugins`, rebuilds every
/// `.rs` file on each pass without pausing, and must be killed to stop.
#[derive(Debug, Parser)]
#[command(name = "hotswap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory holding plugin sources [default: ./plugins]
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Stop after this many poll iterations
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Poll schedule: busy, interval or on-change
    #[arg(long)]
    pub schedule: Option<PollSchedule>,

    /// Interval for the interval schedule, re-scan timeout for on-change
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// What to remove on exit: source, scratch, both or keep
    #[arg(long)]
    pub teardown: Option<TeardownPolicy>,

    /// Keep at most this many loaded modules [default: keep all]
    #[arg(long)]
    pub keep_last: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load the configuration file, if any, and apply flag overrides
    pub fn harness_config(&self) -> ConfigResult<HarnessConfig> {
        let mut config: HarnessConfig = match &self.config {
            Some(path) => load_config(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(dir) = &self.source_dir {
            config.workspace.source_dir = Some(dir.clone());
        }
        if let Some(teardown) = self.teardown {
            config.workspace.teardown = teardown;
        }
        if let Some(mode) = self.schedule {
            config.schedule.mode = mode;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.schedule.interval_ms = interval_ms;
        }
        if let Some(n) = self.keep_last {
            config.retention.keep_last = Some(n);
        }

        Ok(config)
    }
}
