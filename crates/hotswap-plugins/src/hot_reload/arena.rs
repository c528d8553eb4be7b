//! Loaded module arena
//!
//! A module cannot be closed while anything it handed out may still be in use,
//! and the harness has no way to know when that is. Modules are therefore kept
//! here after their entry point returns. With `RetentionPolicy::RetainAll` the
//! arena grows for the life of the process; `KeepLast(n)` closes the oldest
//! modules once more than `n` are held.

use std::collections::VecDeque;
use std::path::Path;

use hotswap_kernel::RetentionPolicy;
use tracing::debug;

use super::loader::LoadedModule;

/// Retained plugin modules, oldest first
#[derive(Debug, Default)]
pub struct ModuleArena {
    policy: RetentionPolicy,
    modules: VecDeque<LoadedModule>,
    /// Number of modules closed by eviction
    evicted: u64,
}

impl ModuleArena {
    /// Create a new arena
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            modules: VecDeque::new(),
            evicted: 0,
        }
    }

    /// Get the retention policy
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Keep a module, evicting old ones if the policy asks for it
    pub fn retain(&mut self, module: LoadedModule) {
        self.modules.push_back(module);

        if let RetentionPolicy::KeepLast(limit) = self.policy {
            while self.modules.len() > limit {
                if let Some(oldest) = self.modules.pop_front() {
                    debug!("Evicting plugin module: {:?}", oldest.path());
                    self.evicted += 1;
                }
            }
        }
    }

    /// Number of retained modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is retained
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Number of modules closed by eviction so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Object paths of the retained modules, oldest first
    pub fn loaded(&self) -> impl Iterator<Item = &Path> {
        self.modules.iter().map(LoadedModule::path)
    }
}
