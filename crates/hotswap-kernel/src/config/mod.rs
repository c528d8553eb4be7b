//! Harness configuration
//!
//! Configuration can be given as YAML, TOML or JSON. The format is detected from
//! the file extension and parsed through the `config` crate. Every field has a
//! default, so an empty file (or no file at all) yields the stock behaviour:
//! `./plugins`, busy polling, retain every loaded module, remove the source
//! directory on teardown.

mod harness;

pub use harness::{
    CompilerConfig, HarnessConfig, PollSchedule, RetentionConfig, RetentionPolicy,
    ScheduleConfig, TeardownPolicy, WorkspaceConfig, DEFAULT_SOURCE_DIR,
};

use config::{Config as Cfg, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detect configuration format from file extension
///
/// - YAML: `.yaml`, `.yml`
/// - TOML: `.toml`
/// - JSON: `.json`
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Load configuration from a file
///
/// ```rust,ignore
/// use hotswap_kernel::config::{load_config, HarnessConfig};
///
/// let config: HarnessConfig = load_config("hotswap.toml")?;
/// ```
pub fn load_config<T, P>(path: P) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    debug!("Loading config from {:?} as {:?}", path, format);

    from_str(&content, format)
}

/// Load configuration from a string with explicit format
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let config = Cfg::builder()
        .add_source(File::from_str(content, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}
