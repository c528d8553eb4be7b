//! Poll loop
//!
//! Lists the plugin sources, then compiles, loads and runs each of them in turn.
//! Per-file failures are logged and never stop the loop; only a source
//! directory that cannot be read ends it.

use std::io;
use std::path::Path;

use hotswap_kernel::{HarnessConfig, PollSchedule, ScheduleConfig};
use tracing::{debug, error, warn};

use super::compiler::{CompileError, Compiler};
use super::loader::{LoadError, Loader};
use super::watcher::SourceWatcher;
use super::workspace::{Workspace, WorkspaceError};

/// Per-file error types
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl HarnessError {
    /// Stage the error happened in
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Compile(_) => "compile",
            Self::Load(_) => "run",
        }
    }
}

/// A failed file within one iteration
#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: HarnessError,
}

/// Outcome of one poll iteration
#[derive(Debug, Default)]
pub struct IterationReport {
    /// Files attempted, in the order they were attempted
    pub attempted: Vec<String>,
    /// Files that failed
    pub failures: Vec<FileFailure>,
}

impl IterationReport {
    /// Number of files that compiled and ran cleanly
    pub fn succeeded(&self) -> usize {
        self.attempted.len() - self.failures.len()
    }

    /// Get the failure recorded for `file`
    pub fn failure(&self, file: &str) -> Option<&HarnessError> {
        self.failures
            .iter()
            .find(|f| f.file == file)
            .map(|f| &f.error)
    }
}

/// Removes a compiled object when dropped
pub struct ArtifactGuard<'a> {
    path: &'a Path,
}

impl<'a> ArtifactGuard<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!("Removed artifact {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {:?}: {}", self.path, e),
        }
    }
}

/// Drives compile, load and run over the watched directory
pub struct Poller {
    workspace: Workspace,
    compiler: Compiler,
    loader: Loader,
    schedule: ScheduleConfig,
    /// Created on first use by the `on-change` schedule
    watcher: Option<SourceWatcher>,
    /// Completed iterations
    iterations: u64,
}

impl Poller {
    /// Create a new poller with the busy schedule
    pub fn new(workspace: Workspace, compiler: Compiler, loader: Loader) -> Self {
        Self {
            workspace,
            compiler,
            loader,
            schedule: ScheduleConfig::default(),
            watcher: None,
            iterations: 0,
        }
    }

    /// Build workspace, compiler and loader from configuration
    pub fn from_config(config: &HarnessConfig) -> Result<Self, WorkspaceError> {
        let workspace = Workspace::initialize(&config.workspace)?;
        let compiler = Compiler::new(config.compiler.clone());
        let loader = Loader::new(config.retention.policy());

        Ok(Self::new(workspace, compiler, loader).with_schedule(config.schedule.clone()))
    }

    /// Set the poll schedule
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    /// Get the workspace
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Get the compiler
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Get the loader
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Number of completed iterations
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Compile one source file, run it and remove its object
    pub fn compile_and_run(&mut self, name: &str) -> Result<(), HarnessError> {
        let artifact = self.compiler.compile(&self.workspace, name)?;
        let _guard = ArtifactGuard::new(artifact.path());

        self.loader.load_and_run(artifact.path())?;
        Ok(())
    }

    /// Run one pass over every source file currently in the directory
    pub fn run_iteration(&mut self) -> Result<IterationReport, WorkspaceError> {
        let names = self.workspace.list_source_files()?;
        let mut report = IterationReport::default();

        for name in names {
            if let Err(err) = self.compile_and_run(&name) {
                error!("Could not {} {}: {}", err.stage(), name, err);
                report.failures.push(FileFailure {
                    file: name.clone(),
                    error: err,
                });
            }
            report.attempted.push(name);
        }

        self.iterations += 1;
        debug!(
            "Iteration {} done: {} attempted, {} failed, {} modules retained",
            self.iterations,
            report.attempted.len(),
            report.failures.len(),
            self.loader.arena().len()
        );

        Ok(report)
    }

    /// Poll until the source directory cannot be read, or `limit` iterations ran
    pub fn run(&mut self, limit: Option<u64>) -> Result<(), WorkspaceError> {
        if self.schedule.mode == PollSchedule::OnChange {
            self.ensure_watcher();
        }

        let mut completed = 0;
        while limit.is_none_or(|limit| completed < limit) {
            if completed > 0 {
                self.pause();
            }
            self.run_iteration()?;
            completed += 1;
        }

        Ok(())
    }

    fn ensure_watcher(&mut self) {
        if self.watcher.is_some() {
            return;
        }
        match SourceWatcher::new(self.workspace.source_dir()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => warn!(
                "Could not watch {:?}, polling every {:?} instead: {}",
                self.workspace.source_dir(),
                self.schedule.interval(),
                e
            ),
        }
    }

    fn pause(&mut self) {
        match self.schedule.mode {
            PollSchedule::Busy => {}
            PollSchedule::Interval => std::thread::sleep(self.schedule.interval()),
            PollSchedule::OnChange => {
                self.ensure_watcher();
                match &self.watcher {
                    Some(watcher) => {
                        watcher.wait_for_change(self.schedule.interval());
                    }
                    None => std::thread::sleep(self.schedule.interval()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_kernel::{CompilerConfig, RetentionPolicy, TeardownPolicy, WorkspaceConfig};

    fn poller_with(dir: &Path, compiler: CompilerConfig) -> Poller {
        let config = WorkspaceConfig::new()
            .with_source_dir(dir.join("plugins"))
            .with_teardown(TeardownPolicy::Scratch);
        let workspace = Workspace::initialize(&config).unwrap();
        std::fs::create_dir_all(workspace.source_dir()).unwrap();
        Poller::new(
            workspace,
            Compiler::new(compiler),
            Loader::new(RetentionPolicy::RetainAll),
        )
    }

    #[test]
    fn test_artifact_guard_removes_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("42.so");
        std::fs::write(&path, b"").unwrap();

        drop(ArtifactGuard::new(&path));
        assert!(!path.exists());

        // Already gone
        drop(ArtifactGuard::new(&path));
    }

    #[test]
    fn test_empty_directory_iteration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut poller = poller_with(temp_dir.path(), CompilerConfig::default());

        let report = poller.run_iteration().unwrap();
        assert!(report.attempted.is_empty());
        assert_eq!(report.succeeded(), 0);
        assert_eq!(poller.iterations(), 1);
    }

    #[test]
    fn test_every_file_attempted_despite_failures() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut poller = poller_with(
            temp_dir.path(),
            CompilerConfig::new().with_program("hotswap-no-such-compiler"),
        );
        for name in ["a.rs", "b.rs", "c.rs"] {
            std::fs::write(poller.workspace().source_dir().join(name), "").unwrap();
        }

        let report = poller.run_iteration().unwrap();

        let mut attempted = report.attempted.clone();
        attempted.sort();
        assert_eq!(attempted, vec!["a.rs", "b.rs", "c.rs"]);
        assert_eq!(report.failures.len(), 3);
        for failure in &report.failures {
            assert_eq!(failure.error.stage(), "compile");
            assert!(matches!(
                failure.error,
                HarnessError::Compile(CompileError::Spawn { .. })
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_object_is_load_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut poller = poller_with(temp_dir.path(), CompilerConfig::new().with_program("true"));
        std::fs::write(poller.workspace().source_dir().join("hello.rs"), "").unwrap();

        let report = poller.run_iteration().unwrap();

        let err = report.failure("hello.rs").unwrap();
        assert_eq!(err.stage(), "run");
        assert!(matches!(err, HarnessError::Load(LoadError::Open { .. })));
        assert!(poller.loader().arena().is_empty());
    }

    #[test]
    fn test_run_with_limit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut poller = poller_with(temp_dir.path(), CompilerConfig::default())
            .with_schedule(ScheduleConfig::new(PollSchedule::Interval).with_interval_ms(1));

        poller.run(Some(3)).unwrap();
        assert_eq!(poller.iterations(), 3);
    }

    #[test]
    fn test_run_stops_when_directory_disappears() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut poller = poller_with(temp_dir.path(), CompilerConfig::default());
        std::fs::remove_dir_all(poller.workspace().source_dir()).unwrap();

        let err = poller.run(None).unwrap_err();
        assert!(matches!(err, WorkspaceError::DirectoryEnumeration { .. }));
        assert_eq!(poller.iterations(), 0);
    }
}
