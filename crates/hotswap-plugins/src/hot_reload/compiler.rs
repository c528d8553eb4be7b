//! Plugin compiler
//!
//! Copies a plugin source under a fresh random name into the scratch directory
//! and builds it into a dynamic library with the external toolchain.
//!
//! The copy gets a new name on every build so the toolchain never keys a cached
//! result on the plugin's own path.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use hotswap_kernel::CompilerConfig;
use rand::Rng;
use tracing::debug;

use super::workspace::{SOURCE_EXTENSION, Workspace};

/// Extension of compiled plugin objects on this platform
pub const OBJECT_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

/// Compile error types
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Could not start compiler '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("Compiler failed on {file} with {status}")]
    Toolchain { file: String, status: ExitStatus },
}

/// A compiled plugin object in the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Random id shared by the source copy and the object
    id: u64,
    /// Compiled dynamic library
    path: PathBuf,
    /// Copy of the source the object was built from
    source_copy: PathBuf,
}

impl Artifact {
    /// Get the artifact id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the object path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path of the source copy
    pub fn source_copy(&self) -> &Path {
        &self.source_copy
    }
}

/// Builds plugin sources into loadable objects
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Create a new compiler
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `file_name` from the workspace source directory
    pub fn compile(
        &mut self,
        workspace: &Workspace,
        file_name: &str,
    ) -> Result<Artifact, CompileError> {
        let path = workspace.source_dir().join(file_name);
        let content = std::fs::read(&path).map_err(|source| CompileError::Read { path, source })?;

        let (id, source_copy) = self.write_copy(workspace.scratch_dir(), &content)?;
        let object_path = source_copy.with_extension(OBJECT_EXTENSION);

        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--crate-type")
            .arg("cdylib")
            .arg("--crate-name")
            .arg(format!("plugin_{}", id))
            .arg("--edition")
            .arg(&self.config.edition)
            .arg("-o")
            .arg(&object_path)
            .arg(&source_copy)
            .args(&self.config.extra_args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!("Compiling {}: {:?}", file_name, cmd);

        let status = cmd.status().map_err(|source| CompileError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(CompileError::Toolchain {
                file: file_name.to_string(),
                status,
            });
        }

        Ok(Artifact {
            id,
            path: object_path,
            source_copy,
        })
    }

    /// Write `content` under a new random name
    ///
    /// Source copies are never removed while the workspace lives, so
    /// `create_new` rejects every id used before.
    fn write_copy(
        &self,
        scratch_dir: &Path,
        content: &[u8],
    ) -> Result<(u64, PathBuf), CompileError> {
        let mut rng = rand::thread_rng();

        loop {
            let id: u64 = rng.r#gen();
            let path = scratch_dir.join(format!("{}.{}", id, SOURCE_EXTENSION));
            let file = OpenOptions::new().write(true).create_new(true).open(&path);

            match file {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|source| CompileError::Write {
                            path: path.clone(),
                            source,
                        })?;
                    return Ok((id, path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(CompileError::Write { path, source }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_kernel::{TeardownPolicy, WorkspaceConfig};

    fn workspace(dir: &Path) -> Workspace {
        let config = WorkspaceConfig::new()
            .with_source_dir(dir.join("plugins"))
            .with_teardown(TeardownPolicy::Both);
        let workspace = Workspace::initialize(&config).unwrap();
        std::fs::create_dir_all(workspace.source_dir()).unwrap();
        workspace
    }

    #[cfg(unix)]
    #[test]
    fn test_same_source_gets_distinct_artifacts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace(temp_dir.path());
        std::fs::write(workspace.source_dir().join("hello.rs"), "fn main() {}").unwrap();

        // `true` accepts any arguments and succeeds without writing an object
        let mut compiler = Compiler::new(CompilerConfig::new().with_program("true"));
        let first = compiler.compile(&workspace, "hello.rs").unwrap();
        let second = compiler.compile(&workspace, "hello.rs").unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.path(), second.path());
        assert_eq!(
            std::fs::read_dir(workspace.scratch_dir()).unwrap().count(),
            2
        );

        assert_eq!(first.path().parent(), Some(workspace.scratch_dir()));
        assert_eq!(
            first.path().file_name().unwrap().to_str().unwrap(),
            format!("{}.{}", first.id(), OBJECT_EXTENSION)
        );
        assert_eq!(
            std::fs::read_to_string(second.source_copy()).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_missing_source_is_read_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace(temp_dir.path());

        let mut compiler = Compiler::new(CompilerConfig::default());
        let err = compiler.compile(&workspace, "absent.rs").unwrap_err();

        assert!(matches!(err, CompileError::Read { .. }));
        assert!(err.to_string().contains("absent.rs"));
        assert_eq!(
            std::fs::read_dir(workspace.scratch_dir()).unwrap().count(),
            0
        );
    }

    #[test]
    fn test_unknown_program_is_spawn_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace(temp_dir.path());
        std::fs::write(workspace.source_dir().join("hello.rs"), "").unwrap();

        let mut compiler =
            Compiler::new(CompilerConfig::new().with_program("hotswap-no-such-compiler"));
        let err = compiler.compile(&workspace, "hello.rs").unwrap_err();

        assert!(matches!(err, CompileError::Spawn { .. }));
        assert!(err.to_string().contains("hotswap-no-such-compiler"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_toolchain_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = workspace(temp_dir.path());
        std::fs::write(workspace.source_dir().join("broken.rs"), "fn {").unwrap();

        let mut compiler = Compiler::new(CompilerConfig::new().with_program("false"));
        let err = compiler.compile(&workspace, "broken.rs").unwrap_err();

        match &err {
            CompileError::Toolchain { file, status } => {
                assert_eq!(file, "broken.rs");
                assert!(!status.success());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("broken.rs"));
    }
}
