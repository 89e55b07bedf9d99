//! Debounced file watching for registered paths.
//!
//! Parent directories are watched rather than files so editors that save by
//! replacing the file are still seen.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer, notify::RecursiveMode};
use tokio::sync::mpsc;

use fable_bridge_types::SourcePath;

const DEBOUNCE: Duration = Duration::from_millis(200);

type Registered = Arc<Mutex<HashSet<SourcePath>>>;

pub struct FileWatcher {
    /// Kept alive to keep the watch running.
    debouncer: Debouncer<notify::RecommendedWatcher>,
    registered: Registered,
    directories: HashSet<PathBuf>,
    rx: mpsc::UnboundedReceiver<SourcePath>,
}

impl FileWatcher {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let registered = Registered::default();
        let filter = registered.clone();

        let debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let registered = filter.lock().unwrap_or_else(PoisonError::into_inner);
                for event in events {
                    let path = SourcePath::from(event.path.as_path());
                    if registered.contains(&path) {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(e) => tracing::warn!("File watch error: {e}"),
        })
        .context("failed to start file watcher")?;

        Ok(Self {
            debouncer,
            registered,
            directories: HashSet::new(),
            rx,
        })
    }

    /// Report changes to `path` from now on.
    pub fn watch(&mut self, path: &SourcePath) -> Result<()> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone());

        let dir = Path::new(path.as_str())
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if self.directories.insert(dir.clone()) {
            self.debouncer
                .watcher()
                .watch(&dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            tracing::debug!(dir = %dir.display(), "Watching directory");
        }
        Ok(())
    }

    pub async fn recv(&mut self) -> Option<SourcePath> {
        self.rx.recv().await
    }
}
