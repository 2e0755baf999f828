// File watcher for incremental updates

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::index::Parser;
use crate::indexer::parser::PythonParser;
use crate::indexer::walker::is_candidate;
use crate::workspace::Workspace;

/// Wait before retrying a rescan declined because another scan was running.
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// What a filesystem event means for the index
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Rescan(PathBuf),
    Remove(PathBuf),
}

/// File watcher feeding changes into a workspace
pub struct FileWatcher {
    workspace: Arc<Workspace>,
    watch_path: PathBuf,
    exclusions: Vec<String>,
    parser: PythonParser,
    /// Files changed on disk and not yet rescanned.
    pending: Mutex<BTreeSet<PathBuf>>,
}

impl FileWatcher {
    pub fn new(workspace: Arc<Workspace>, watch_path: PathBuf, exclusions: Vec<String>) -> Self {
        Self {
            workspace,
            watch_path,
            exclusions,
            parser: PythonParser::new(),
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    /// Watch until the event channel closes.
    pub async fn watch(&self) -> Result<()> {
        info!("Starting file watcher for: {}", self.watch_path.display());

        let (tx, mut rx) = mpsc::channel(100);

        // notify calls back on its own thread, outside the runtime.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(e) = tx.blocking_send(event) {
                        error!("Failed to forward file event: {}", e);
                    }
                }
                Err(e) => error!("File watch error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&self.watch_path, RecursiveMode::Recursive)?;

        info!("File watcher started. Monitoring for changes...");

        while let Some(event) = rx.recv().await {
            self.handle_event(&event);
            self.flush_pending().await;
        }

        Ok(())
    }

    /// Queue rescans and apply removals for one event.
    fn handle_event(&self, event: &Event) {
        debug!("File event: {:?}", event);

        for change in self.changes(event) {
            match change {
                Change::Rescan(path) => {
                    info!("File changed: {}", path.display());
                    self.pending.lock().insert(path);
                }
                Change::Remove(path) => {
                    info!("File removed: {}", path.display());
                    self.pending.lock().remove(&path);
                    self.workspace.file_removed(&path);
                }
            }
        }
    }

    /// Rescan every queued file, one scan at a time. A rescan declined
    /// because another scan is running stays queued and is retried.
    async fn flush_pending(&self) {
        loop {
            let next = self.pending.lock().pop_first();
            let Some(path) = next else {
                return;
            };

            match self.workspace.file_saved(&path) {
                Some(ticket) => {
                    if let Err(diagnostic) = ticket.wait().await {
                        warn!("Rescan of {} aborted: {}", path.display(), diagnostic);
                    }
                }
                None => {
                    debug!("Scan in progress, retrying {}", path.display());
                    self.pending.lock().insert(path);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    fn changes(&self, event: &Event) -> Vec<Change> {
        event
            .paths
            .iter()
            .filter(|path| self.is_source_file(path))
            .filter_map(|path| match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => Some(Change::Rescan(path.clone())),
                EventKind::Remove(_) => Some(Change::Remove(path.clone())),
                _ => None,
            })
            .collect()
    }

    fn is_source_file(&self, path: &Path) -> bool {
        is_candidate(path, &self.exclusions, &self.parser as &dyn Parser)
    }
}

/// Watch a workspace's first root, blocking until the watcher stops.
pub async fn start_watcher(workspace: Arc<Workspace>, exclusions: Vec<String>) -> Result<()> {
    let Some(root) = workspace.roots().into_iter().next() else {
        return Ok(());
    };

    info!("Initializing file watcher for workspace: {}", workspace.id());

    let watcher = FileWatcher::new(workspace, root, exclusions);
    watcher.watch().await
}
