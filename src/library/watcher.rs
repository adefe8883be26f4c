//! Page directory watcher.
//!
//! Reports image files that appear in or vanish from a page directory outside
//! the library (file manager drops, sync tools) so a UI can re-list the page.
//! Hidden entries (thumbnails, order marker, lock file) are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::SupportedTypes;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Page directory to watch (non-recursive)
    pub page_dir: PathBuf,

    /// Debounce window for bursts of file-system events
    pub debounce_ms: u64,
}

impl WatcherConfig {
    pub fn new(page_dir: impl Into<PathBuf>) -> Self {
        Self {
            page_dir: page_dir.into(),
            debounce_ms: 500,
        }
    }

    /// Check the watch path exists and resolve it the way notify reports paths
    pub fn validate(&self) -> Result<PathBuf, WatcherError> {
        if !self.page_dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(self.page_dir.clone()));
        }

        self.page_dir
            .canonicalize()
            .map_err(|_| WatcherError::DirectoryNotFound(self.page_dir.clone()))
    }
}

/// An image file changed in the page directory
#[derive(Debug, Clone, Serialize)]
pub struct PageChange {
    pub path: PathBuf,

    /// Whether the file exists after the change
    pub present: bool,

    pub detected_at: DateTime<Utc>,
}

/// Watches one page directory
pub struct PageWatcher {
    config: WatcherConfig,
    types: SupportedTypes,
}

impl PageWatcher {
    pub fn new(config: WatcherConfig, types: SupportedTypes) -> Self {
        Self { config, types }
    }

    /// Start watching; changes arrive on the returned channel until stopped
    pub fn watch(&self) -> Result<(mpsc::Receiver<PageChange>, WatchHandle), WatcherError> {
        let page_dir = self.config.validate()?;

        let (change_tx, change_rx) = mpsc::channel::<PageChange>(100);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);

        let config = WatcherConfig {
            page_dir,
            ..self.config.clone()
        };
        let types = self.types.clone();

        // The notify receiver blocks, so the loop lives on a blocking thread
        let task = tokio::task::spawn_blocking(move || {
            if let Err(e) = run_watcher(config, types, change_tx, stop_rx) {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((change_rx, WatchHandle { stop_tx, task }))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its loop to exit
    pub async fn stop(self) -> Result<(), WatcherError> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// True for visible, supported image files directly inside `page_dir`
pub fn is_relevant(page_dir: &Path, path: &Path, types: &SupportedTypes) -> bool {
    let hidden = path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(true);

    !hidden && path.parent() == Some(page_dir) && types.is_supported(path)
}

/// Internal watcher loop
fn run_watcher(
    config: WatcherConfig,
    types: SupportedTypes,
    change_tx: mpsc::Sender<PageChange>,
    mut stop_rx: mpsc::Receiver<()>,
) -> Result<(), WatcherError> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(Duration::from_millis(config.debounce_ms), tx)?;
    debouncer
        .watcher()
        .watch(&config.page_dir, RecursiveMode::NonRecursive)?;

    tracing::info!("Watching {} for image changes", config.page_dir.display());

    loop {
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(Ok(events)) => {
                for event in events {
                    if !is_relevant(&config.page_dir, &event.path, &types) {
                        continue;
                    }

                    let change = PageChange {
                        present: event.path.is_file(),
                        path: event.path,
                        detected_at: Utc::now(),
                    };
                    tracing::debug!("Page change: {} (present: {})", change.path.display(), change.present);

                    if change_tx.blocking_send(change).is_err() {
                        // Receiver dropped; nobody is listening anymore
                        return Ok(());
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }
    }

    Ok(())
}
