//! Dynamic plugin loader
//!
//! Opens compiled plugin objects, checks the `Run` entry point against the
//! published signature and calls it on the current thread.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::time::Instant;

use hotswap_kernel::RetentionPolicy;
use hotswap_kernel::abi::{RUN_SIGNATURE, RUN_SYMBOL, RunFn, SIGNATURE_SYMBOL};
use libloading::Library;
use tracing::debug;

use super::arena::ModuleArena;

/// Plugin load error types
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Could not open {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("Could not find {symbol} function in {}", path.display())]
    SymbolNotFound { path: PathBuf, symbol: &'static str },

    #[error(
        "Found {symbol} in {} but its signature is {} instead of {expected}",
        path.display(),
        found.as_deref().unwrap_or("undeclared")
    )]
    SignatureMismatch {
        path: PathBuf,
        symbol: &'static str,
        expected: &'static str,
        found: Option<String>,
    },

    #[error("Plugin failed with error {message}")]
    PluginRuntime { path: PathBuf, message: String },
}

/// Outcome of resolving the entry point of a module
#[derive(Debug, Clone)]
pub enum EntryPointLookup {
    /// `Run` exists and declares the expected signature
    Found(RunFn),
    /// `Run` exists but its declared signature differs or is missing
    SignatureMismatch { found: Option<String> },
    /// No `Run` symbol
    NotFound,
}

/// Resolve the `Run` entry point of a loaded library
///
/// The function pointer is only valid while `library` stays loaded.
pub fn resolve_entry_point(library: &Library) -> EntryPointLookup {
    let run = match unsafe { library.get::<RunFn>(RUN_SYMBOL.as_bytes()) } {
        Ok(symbol) => *symbol,
        Err(_) => return EntryPointLookup::NotFound,
    };

    let declared = unsafe { library.get::<*const u8>(SIGNATURE_SYMBOL.as_bytes()) }
        .ok()
        .map(|symbol| unsafe { compare_descriptor(*symbol) });

    match declared {
        Some(Ok(())) => EntryPointLookup::Found(run),
        Some(Err(found)) => EntryPointLookup::SignatureMismatch { found: Some(found) },
        None => EntryPointLookup::SignatureMismatch { found: None },
    }
}

/// Compare a plugin descriptor with `RUN_SIGNATURE` and its terminating NUL
///
/// Stops at the first differing byte, so at most `RUN_SIGNATURE.len() + 1`
/// bytes are read. On mismatch returns the bytes compared, minus any NUL.
///
/// # Safety
/// `ptr` must point to readable memory up to the first byte that differs from
/// the expected descriptor.
unsafe fn compare_descriptor(ptr: *const u8) -> Result<(), String> {
    let expected = RUN_SIGNATURE.as_bytes().iter().copied().chain([0]);

    let mut read = Vec::new();
    for (offset, want) in expected.enumerate() {
        let byte = unsafe { *ptr.add(offset) };
        if byte != want {
            if byte != 0 {
                read.push(byte);
            }
            return Err(String::from_utf8_lossy(&read).into_owned());
        }
        read.push(byte);
    }
    Ok(())
}

/// An opened plugin with a validated entry point
pub struct LoadedModule {
    /// Object the module was opened from
    path: PathBuf,
    /// Entry point, valid while `library` is loaded
    run: RunFn,
    /// Load timestamp
    loaded_at: Instant,
    /// The loaded library
    library: Library,
}

impl LoadedModule {
    /// Get the object path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get when the module was loaded
    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Call the entry point on the current thread
    ///
    /// The plugin runs with full process privileges. A panic inside `Run`
    /// aborts the process.
    pub fn run(&self) -> Result<(), LoadError> {
        let result: *const c_char = unsafe { (self.run)() };
        if result.is_null() {
            return Ok(());
        }

        let message = unsafe { CStr::from_ptr(result) }
            .to_string_lossy()
            .into_owned();
        Err(LoadError::PluginRuntime {
            path: self.path.clone(),
            message,
        })
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        debug!("Closing plugin module: {:?}", self.path);
    }
}

/// Opens plugin objects and keeps them in a module arena
pub struct Loader {
    arena: ModuleArena,
}

impl Loader {
    /// Create a new loader
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            arena: ModuleArena::new(retention),
        }
    }

    /// Get the module arena
    pub fn arena(&self) -> &ModuleArena {
        &self.arena
    }

    /// Open an object and validate its entry point
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModule, LoadError> {
        let path = path.as_ref().to_path_buf();

        let library = unsafe { Library::new(&path) }.map_err(|e| LoadError::Open {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let run = match resolve_entry_point(&library) {
            EntryPointLookup::Found(run) => run,
            EntryPointLookup::NotFound => {
                return Err(LoadError::SymbolNotFound {
                    path,
                    symbol: RUN_SYMBOL,
                });
            }
            EntryPointLookup::SignatureMismatch { found } => {
                return Err(LoadError::SignatureMismatch {
                    path,
                    symbol: RUN_SYMBOL,
                    expected: RUN_SIGNATURE,
                    found,
                });
            }
        };

        debug!("Loaded plugin module: {:?}", path);

        Ok(LoadedModule {
            path,
            run,
            loaded_at: Instant::now(),
            library,
        })
    }

    /// Open an object, call its entry point and retain the module
    pub fn load_and_run<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoadError> {
        let module = self.load(path)?;
        let result = module.run();
        self.arena.retain(module);
        result
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}
