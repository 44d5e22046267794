//! Hot reload of the processing configuration.
//!
//! File system notifications arrive on the watcher's own thread. Editors
//! often save with several write calls, so every notification goes through
//! a [`Debouncer`]: only the last notification of a burst reloads the file.
//! The reloaded snapshot and its change flags are published to a
//! [`ConfigStore`], which the frame loop drains once per iteration.

use crate::config::{ConfigChange, ProcessingConfig};
use crate::constants::RELOAD_DEBOUNCE_MS;
use crate::{Error, Result};
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Runs only the last of a burst of actions.
///
/// Each call bumps a generation counter and schedules the action after the
/// quiescence window. When the window elapses the action runs only if no
/// newer call has bumped the counter in the meantime.
pub struct Debouncer {
    wait: Duration,
    generation: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl Debouncer {
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            generation: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule `action`, superseding any action still waiting
    pub fn debounce<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let scheduled = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let cancelled = Arc::clone(&self.cancelled);
        let wait = self.wait;

        let spawned = thread::Builder::new().name("config-debounce".to_string()).spawn(move || {
            thread::sleep(wait);
            if generation.load(Ordering::SeqCst) == scheduled && !cancelled.load(Ordering::SeqCst) {
                action();
            }
        });

        if let Err(e) = spawned {
            error!("Failed to schedule debounced action: {}", e);
        }
    }

    /// Number of actions scheduled so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(RELOAD_DEBOUNCE_MS))
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// A published snapshot waiting to be applied by the frame loop
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    pub config: Arc<ProcessingConfig>,
    pub change: ConfigChange,
}

#[derive(Debug)]
struct StoreInner {
    current: Arc<ProcessingConfig>,
    pending: Option<ConfigUpdate>,
}

/// Shared handle to the current configuration snapshot.
///
/// Publishing swaps the snapshot and its change flags under one lock, so
/// the frame loop never sees a snapshot paired with another reload's flags.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(initial: ProcessingConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                current: Arc::new(initial),
                pending: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest published snapshot
    #[must_use]
    pub fn current(&self) -> Arc<ProcessingConfig> {
        Arc::clone(&self.lock().current)
    }

    /// Replace the snapshot and queue it for the frame loop.
    ///
    /// Restart flags of updates the frame loop has not consumed yet are
    /// carried over.
    pub fn publish(&self, config: ProcessingConfig) -> ConfigChange {
        let mut inner = self.lock();
        let change = config.diff(&inner.current);
        let merged = match inner.pending.take() {
            Some(pending) => change.merge(pending.change),
            None => change,
        };

        let config = Arc::new(config);
        inner.current = Arc::clone(&config);
        inner.pending = Some(ConfigUpdate { config, change: merged });
        change
    }

    /// Take the pending update, if any
    pub fn take_update(&self) -> Option<ConfigUpdate> {
        self.lock().pending.take()
    }
}

/// Reload the file at `path` and publish it to `store`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed; the store keeps
/// its previous snapshot.
pub fn reload(path: &Path, store: &ConfigStore) -> Result<ConfigChange> {
    let config = ProcessingConfig::from_file(path)?;
    config.validate()?;
    let change = store.publish(config);
    info!(
        "Configuration reloaded from {} (camera restart needed: {})",
        path.display(),
        change.needs_camera_restart
    );
    Ok(change)
}

/// Watches the configuration file and publishes debounced reloads
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    debouncer: Arc<Debouncer>,
}

impl ConfigWatcher {
    /// Start watching `path`, publishing reloads to `store`
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no file name or the watcher cannot
    /// be started
    pub fn start(path: &Path, store: ConfigStore, debouncer: Debouncer) -> Result<Self> {
        let path = path.canonicalize()?;
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| Error::ConfigError(format!("{} is not a file", path.display())))?;
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::ConfigError(format!("{} has no parent directory", path.display())))?;

        let debouncer = Arc::new(debouncer);
        let handler_debouncer = Arc::clone(&debouncer);
        let config_path = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_config_event(&event, &file_name) => {
                debug!("Config change notification: {:?}", event.kind);
                let store = store.clone();
                let config_path: PathBuf = config_path.clone();
                handler_debouncer.debounce(move || {
                    if let Err(e) = reload(&config_path, &store) {
                        warn!("Keeping previous configuration: {}", e);
                    }
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Config watcher error: {}", e),
        })?;

        // Watch the directory: editors often replace the file instead of writing it
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!("Watching {} for configuration changes", path.display());

        Ok(Self {
            _watcher: watcher,
            debouncer,
        })
    }

    /// Notifications received so far
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.debouncer.generation()
    }
}

fn is_config_event(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|name| name == file_name.as_os_str()))
}
