// PolicyWatcher - Hot reload of access policies
//
// Responsibilities:
// - Watch the policy store sources (files and directories)
// - Fingerprint source contents (CRC32) to skip no-op events
// - Refill the policy store and reload the controller's policy table
//
// A source that fails to parse leaves the running policies untouched.

use crate::access::S4acAccessController;
use crate::config::StoreSource;
use crate::errors::Result;
use crate::store::TripleStore;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct PolicyWatcher {
    controller: Arc<S4acAccessController>,
    store: TripleStore,
    source: StoreSource,
    base_dir: PathBuf,
    fingerprint: Mutex<u32>,
}

impl PolicyWatcher {
    /// # Arguments
    /// * `controller` - Controller whose policies get reloaded
    /// * `store` - Policy store the controller reads from
    /// * `source` - Where the policy store is loaded from
    /// * `base_dir` - Directory relative source paths resolve against
    pub fn new(
        controller: Arc<S4acAccessController>,
        store: TripleStore,
        source: StoreSource,
        base_dir: PathBuf,
    ) -> Result<Self> {
        let fingerprint = source_fingerprint(&source, &base_dir)?;

        Ok(Self {
            controller,
            store,
            source,
            base_dir,
            fingerprint: Mutex::new(fingerprint),
        })
    }

    /// CRC32 of the current source files, as last seen by the watcher
    pub fn fingerprint(&self) -> u32 {
        *self.fingerprint.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload policies if the sources changed since the last check
    ///
    /// Returns whether a reload happened.
    pub fn check_and_reload(&self) -> Result<bool> {
        let current = source_fingerprint(&self.source, &self.base_dir)?;
        let mut seen = self.fingerprint.lock().unwrap_or_else(PoisonError::into_inner);

        if current == *seen {
            debug!(fingerprint = %hex::encode(current.to_be_bytes()), "policy sources unchanged");
            return Ok(false);
        }

        // Parse into a scratch store, then swap its quads in; the files are read once
        let staging = TripleStore::new("policy-staging")?;
        staging.load_source(&self.source, &self.base_dir)?;

        let quads = self.store.replace_with(&staging)?;
        let policies = self.controller.reload_policies()?;

        info!(
            from = %hex::encode(seen.to_be_bytes()),
            to = %hex::encode(current.to_be_bytes()),
            quads,
            policies,
            "policy sources changed, policies reloaded"
        );
        *seen = current;

        Ok(true)
    }

    /// Watch the sources until `shutdown` is set
    pub fn start(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(tx, NotifyConfig::default())?;

        for path in self.source.watch_paths(&self.base_dir) {
            // Files are watched through their directory so editor rename-saves are seen
            let (target, mode) = if path.is_dir() {
                (path, RecursiveMode::Recursive)
            } else {
                let parent = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.base_dir.clone());
                (parent, RecursiveMode::NonRecursive)
            };

            info!(path = %target.display(), "watching policy source");
            watcher.watch(&target, mode)?;
        }

        info!(fingerprint = %hex::encode(self.fingerprint().to_be_bytes()), "policy watcher ready");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("shutdown signal received, policy watcher exiting");
                break;
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => {
                    if !is_relevant(&event) {
                        continue;
                    }
                    // Coalesce the burst of events a single save produces
                    while rx.recv_timeout(Duration::from_millis(100)).is_ok() {}

                    if let Err(e) = self.check_and_reload() {
                        warn!(error = %e, "policy reload failed; keeping current policies");
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "watcher error");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("watcher channel closed");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// CRC32 over the sorted source file paths and their contents
///
/// Missing files contribute only their path, so deleting one changes the
/// fingerprint.
pub fn source_fingerprint(source: &StoreSource, base_dir: &Path) -> Result<u32> {
    let mut files = source.resolve_files(base_dir)?;
    files.sort();

    let mut hasher = crc32fast::Hasher::new();
    for file in &files {
        hasher.update(file.to_string_lossy().as_bytes());
        if let Ok(content) = fs::read(file) {
            hasher.update(&content);
        }
    }

    Ok(hasher.finalize())
}
