//! File system watcher for plugin sources
//!
//! Backs the `on-change` poll schedule: instead of spinning, the poll loop
//! blocks until a plugin source in the watched directory is created, modified
//! or removed.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::workspace::is_source_file;

/// Watches one source directory, non-recursively
pub struct SourceWatcher {
    /// Watched directory
    source_dir: PathBuf,
    /// Raw notify events
    events: Receiver<notify::Result<Event>>,
    /// Internal watcher handle, kept alive for the event stream
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `source_dir`
    pub fn new<P: AsRef<Path>>(source_dir: P) -> Result<Self, notify::Error> {
        let source_dir = source_dir.as_ref().to_path_buf();
        let (tx, events) = crossbeam_channel::unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                let _ = tx.send(result);
            },
            Config::default(),
        )?;
        watcher.watch(&source_dir, RecursiveMode::NonRecursive)?;

        info!("Watching plugin sources in {:?}", source_dir);

        Ok(Self {
            source_dir,
            events,
            _watcher: watcher,
        })
    }

    /// Get the watched directory
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Block until a plugin source changes or `timeout` elapses
    ///
    /// Returns `true` on a change. Events already queued behind the first
    /// relevant one are discarded, since the next poll iteration rescans the
    /// whole directory anyway.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(Ok(event)) if is_source_event(&event) => {
                    debug!("Source change: {:?}", event);
                    while self.events.try_recv().is_ok() {}
                    return true;
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => {
                    warn!("Watch error on {:?}: {}", self.source_dir, e);
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Watcher for {:?} disconnected", self.source_dir);
                    return false;
                }
            }
        }
    }
}

/// Check whether an event creates, modifies or removes a plugin source
fn is_source_event(event: &Event) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches && event.paths.iter().any(|p| is_source_file(p))
}
