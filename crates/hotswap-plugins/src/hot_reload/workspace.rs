//! Plugin workspace
//!
//! Owns the watched source directory and the private scratch directory that
//! holds source copies and compiled objects.

use std::io;
use std::path::{Path, PathBuf};

use hotswap_kernel::config::DEFAULT_SOURCE_DIR;
use hotswap_kernel::{TeardownPolicy, WorkspaceConfig};
use tracing::{debug, info, warn};

/// Extension of plugin source files
pub const SOURCE_EXTENSION: &str = "rs";

/// Prefix of the scratch directory name
const SCRATCH_PREFIX: &str = "hotswap-";

/// Workspace error types
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Initialization failed: {reason}: {source}")]
    Initialization {
        reason: &'static str,
        source: io::Error,
    },

    #[error("Could not enumerate source directory {}: {source}", path.display())]
    DirectoryEnumeration { path: PathBuf, source: io::Error },
}

/// Source and scratch directories of one harness instance
#[derive(Debug)]
pub struct Workspace {
    /// Watched directory with plugin sources
    source_dir: PathBuf,
    /// Private directory for source copies and objects
    scratch_dir: PathBuf,
    /// What teardown removes
    teardown: TeardownPolicy,
    /// Set once teardown has run
    torn_down: bool,
}

impl Workspace {
    /// Resolve the source directory and allocate a fresh scratch directory
    pub fn initialize(config: &WorkspaceConfig) -> Result<Self, WorkspaceError> {
        let source_dir = match &config.source_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => current_dir()?.join(dir),
            None => current_dir()?.join(DEFAULT_SOURCE_DIR),
        };

        let scratch_dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|source| WorkspaceError::Initialization {
                reason: "could not create objects dir",
                source,
            })?
            .keep();

        info!(
            "Workspace ready: sources in {:?}, objects in {:?}",
            source_dir, scratch_dir
        );

        Ok(Self {
            source_dir,
            scratch_dir,
            teardown: config.teardown,
            torn_down: false,
        })
    }

    /// Get the watched source directory
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Get the scratch directory
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Get the teardown policy
    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.teardown
    }

    /// List plugin source file names, in directory order
    pub fn list_source_files(&self) -> Result<Vec<String>, WorkspaceError> {
        let enumeration_error = |source| WorkspaceError::DirectoryEnumeration {
            path: self.source_dir.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.source_dir).map_err(enumeration_error)? {
            let entry = entry.map_err(enumeration_error)?;
            let path = entry.path();

            if !is_source_file(&path) || path.is_dir() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("Skipping non UTF-8 source file name: {:?}", name),
            }
        }

        Ok(names)
    }

    /// Apply the teardown policy. Runs at most once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        debug!("Tearing down workspace with policy '{}'", self.teardown);

        if self.teardown.removes_source() {
            remove_dir(&self.source_dir);
        }
        if self.teardown.removes_scratch() {
            remove_dir(&self.scratch_dir);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Check whether a path has the plugin source extension
pub fn is_source_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}

fn current_dir() -> Result<PathBuf, WorkspaceError> {
    std::env::current_dir().map_err(|source| WorkspaceError::Initialization {
        reason: "could not find current directory",
        source,
    })
}

fn remove_dir(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_in(dir: &Path, teardown: TeardownPolicy) -> Workspace {
        let config = WorkspaceConfig::new()
            .with_source_dir(dir.join("plugins"))
            .with_teardown(teardown);
        Workspace::initialize(&config).unwrap()
    }

    #[test]
    fn test_initialize_allocates_empty_scratch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(temp_dir.path(), TeardownPolicy::Scratch);

        assert_eq!(workspace.source_dir(), temp_dir.path().join("plugins"));
        assert!(workspace.scratch_dir().is_dir());
        assert_eq!(std::fs::read_dir(workspace.scratch_dir()).unwrap().count(), 0);

        let name = workspace.scratch_dir().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(SCRATCH_PREFIX));
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let temp_dir = tempfile::tempdir().unwrap();
        let a = workspace_in(temp_dir.path(), TeardownPolicy::Scratch);
        let b = workspace_in(temp_dir.path(), TeardownPolicy::Scratch);

        assert_ne!(a.scratch_dir(), b.scratch_dir());
    }

    #[test]
    fn test_list_source_files_filters_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(temp_dir.path(), TeardownPolicy::Scratch);

        std::fs::create_dir_all(workspace.source_dir().join("nested.rs")).unwrap();
        for name in ["a.rs", "b.rs", "notes.txt", "c.rs.bak", "rs"] {
            std::fs::write(workspace.source_dir().join(name), "").unwrap();
        }

        let mut names = workspace.list_source_files().unwrap();
        names.sort();
        assert_eq!(names, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(temp_dir.path(), TeardownPolicy::Scratch);

        let err = workspace.list_source_files().unwrap_err();
        assert!(matches!(err, WorkspaceError::DirectoryEnumeration { .. }));
        assert!(err.to_string().contains("plugins"));
    }

    #[test]
    fn test_teardown_removes_source_by_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::new().with_source_dir(temp_dir.path().join("plugins"));
        let workspace = Workspace::initialize(&config).unwrap();
        std::fs::create_dir_all(workspace.source_dir()).unwrap();

        let source = workspace.source_dir().to_path_buf();
        let scratch = workspace.scratch_dir().to_path_buf();
        drop(workspace);

        assert!(!source.exists());
        assert!(scratch.exists());
        std::fs::remove_dir_all(scratch).unwrap();
    }

    #[test]
    fn test_teardown_policies() {
        let temp_dir = tempfile::tempdir().unwrap();

        let mut workspace = workspace_in(temp_dir.path(), TeardownPolicy::Both);
        std::fs::create_dir_all(workspace.source_dir()).unwrap();
        workspace.teardown();
        assert!(!workspace.source_dir().exists());
        assert!(!workspace.scratch_dir().exists());

        let mut workspace = workspace_in(temp_dir.path(), TeardownPolicy::Keep);
        std::fs::create_dir_all(workspace.source_dir()).unwrap();
        workspace.teardown();
        assert!(workspace.source_dir().exists());
        assert!(workspace.scratch_dir().exists());
        std::fs::remove_dir_all(workspace.scratch_dir()).unwrap();
    }

    #[test]
    fn test_teardown_runs_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut workspace = workspace_in(temp_dir.path(), TeardownPolicy::Source);
        std::fs::create_dir_all(workspace.source_dir()).unwrap();

        workspace.teardown();
        std::fs::create_dir_all(workspace.source_dir()).unwrap();
        drop(workspace);

        assert!(temp_dir.path().join("plugins").exists());
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("/plugins/hello.rs")));
        assert!(!is_source_file(Path::new("/plugins/hello.go")));
        assert!(!is_source_file(Path::new("/plugins/hello")));
    }
}
