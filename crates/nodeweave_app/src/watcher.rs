// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced watcher over schema and document files.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Debounce window for file events
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// A change to one of the watched files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// The file was written or recreated
    Changed(PathBuf),
    /// The file was deleted
    Deleted(PathBuf),
    /// The watcher reported an error
    Error(String),
}

/// Watches a fixed set of files.
///
/// Parent directories are watched non-recursively and events are filtered
/// down to the requested files, so editors that replace files on save are
/// still seen.
pub struct FileWatcher {
    _watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<FileEvent>,
}

impl FileWatcher {
    /// Start watching `files`
    pub fn new(files: &[PathBuf]) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let targets: HashSet<PathBuf> = files.iter().map(|p| absolute(p)).collect();
        let filter = targets.clone();

        let mut watcher = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        for path in event.paths.iter().filter(|p| filter.contains(*p)) {
                            let file_event = match event.kind {
                                EventKind::Create(_) | EventKind::Modify(_) => FileEvent::Changed(path.clone()),
                                EventKind::Remove(_) => FileEvent::Deleted(path.clone()),
                                EventKind::Any | EventKind::Access(_) | EventKind::Other => continue,
                            };
                            let _ = event_tx.send(file_event);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(FileEvent::Error(error.to_string()));
                    }
                }
            }
        })?;

        let dirs: HashSet<PathBuf> = targets
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!("Watching directory for changes: {:?}", dir);
        }

        Ok(Self {
            _watcher: watcher,
            event_rx,
        })
    }

    /// Block until the next batch of events arrives, then drain it.
    ///
    /// Returns `None` once the watcher is gone.
    pub fn wait(&self) -> Option<Vec<FileEvent>> {
        let first = self.event_rx.recv().ok()?;
        let mut events = vec![first];
        loop {
            match self.event_rx.recv_timeout(DEBOUNCE) {
                Ok(event) => {
                    if !events.contains(&event) {
                        events.push(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("File watcher channel disconnected");
                    break;
                }
            }
        }
        Some(events)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
