use hotswap_kernel::config::ConfigError;
use hotswap_plugins::WorkspaceError;
use std::process::ExitCode;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::Workspace(WorkspaceError::Initialization { .. }) => {
                ExitCode::from(2)
            }
            CliError::Workspace(WorkspaceError::DirectoryEnumeration { .. }) => ExitCode::FAILURE,
        }
    }
}
