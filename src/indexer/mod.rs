// Scan orchestration: candidate resolution, cache lookups, extraction, progress

pub mod external;
pub mod parser;
pub mod protocol;
pub mod walker;
pub mod watcher;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Diagnostic, Result};
use crate::index::db::{modified_time, CacheEntry, CacheStore};
use crate::index::{Parser, Symbol};

pub use walker::{ScanRequest, ScanScope};

/// Everything one scan run produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scope: ScanScope,
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
    /// Candidate files visited.
    pub files: usize,
    pub cache_hits: usize,
    pub extracted: usize,
}

impl ScanOutcome {
    fn new(scope: ScanScope) -> Self {
        Self {
            scope,
            symbols: Vec::new(),
            diagnostics: Vec::new(),
            files: 0,
            cache_hits: 0,
            extracted: 0,
        }
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            symbols: self.symbols.len(),
            files: self.files,
            cache_hits: self.cache_hits,
            extracted: self.extracted,
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Counts reported when a scan finishes
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub symbols: usize,
    pub files: usize,
    pub cache_hits: usize,
    pub extracted: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Notifications for the duration of one scan. The stream always ends with
/// `Finished` or `Aborted`.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress(u8),
    Finished(ScanSummary),
    Aborted(Diagnostic),
}

/// Monotonic, coalesced percentages: `floor((i + 1) * 100 / total)`, reported
/// only when it grows.
#[derive(Debug)]
struct ProgressTracker {
    total: usize,
    last: u8,
}

impl ProgressTracker {
    fn new(total: usize) -> Self {
        Self { total, last: 0 }
    }

    fn advance(&mut self, index: usize) -> Option<u8> {
        let percent = ((index + 1) * 100 / self.total.max(1)).min(100) as u8;
        if percent > self.last {
            self.last = percent;
            Some(percent)
        } else {
            None
        }
    }
}

/// Runs extraction over a resolved request, consulting the cache.
pub struct Scanner {
    parser: Arc<dyn Parser + Send + Sync>,
    cache: Option<CacheStore>,
}

impl Scanner {
    pub fn new(parser: Arc<dyn Parser + Send + Sync>, cache: Option<CacheStore>) -> Self {
        Self { parser, cache }
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Run one scan to completion on the calling thread.
    ///
    /// Per-file failures land in `diagnostics`; an `Err` means the run was
    /// aborted (missing walk root, cache store failure) and produced nothing.
    pub fn run_scan(&self, request: &ScanRequest, mut on_progress: impl FnMut(u8)) -> Result<ScanOutcome> {
        self.run_scan_streaming(request, |_, percent| {
            if let Some(percent) = percent {
                on_progress(percent);
            }
        })
    }

    /// Like [`Scanner::run_scan`], but hands over each file as soon as it is
    /// done: its symbols, and the progress percentage if it grew.
    pub fn run_scan_streaming(
        &self,
        request: &ScanRequest,
        mut on_file: impl FnMut(&[Symbol], Option<u8>),
    ) -> Result<ScanOutcome> {
        let candidates = walker::resolve(request, self.parser.as_ref())?;

        if request.scope == ScanScope::Full {
            if let Some(cache) = &self.cache {
                cache.purge_missing()?;
            }
        }

        info!("Scanning {} files ({:?})", candidates.len(), request.scope);

        let mut outcome = ScanOutcome::new(request.scope);
        let mut progress = ProgressTracker::new(candidates.len());

        for (index, path) in candidates.iter().enumerate() {
            let start = outcome.symbols.len();
            self.scan_file(path, request.scope, &mut outcome)?;
            outcome.files += 1;
            on_file(&outcome.symbols[start..], progress.advance(index));
        }

        if candidates.is_empty() {
            on_file(&[], Some(100));
        }

        info!(
            "Scan finished: {} files, {} symbols, {} cache hits, {} diagnostics",
            outcome.files,
            outcome.symbols.len(),
            outcome.cache_hits,
            outcome.diagnostics.len()
        );

        Ok(outcome)
    }

    fn scan_file(&self, path: &Path, scope: ScanScope, outcome: &mut ScanOutcome) -> Result<()> {
        let key = path.to_string_lossy().to_string();

        let modified = match modified_time(path) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat {}: {}", key, e);
                outcome.diagnostics.push(Diagnostic::io_error(&key, e.to_string()));
                return Ok(());
            }
        };

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&key)? {
                // Failed entries are reused by single-file scans only; full
                // scans give broken files another chance.
                let reusable = !entry.parse_failed || scope == ScanScope::SingleFile;
                if entry.is_fresh(modified) && reusable {
                    debug!("Cache hit: {}", key);
                    outcome.cache_hits += 1;
                    outcome.symbols.extend(entry.symbols);
                    return Ok(());
                }
            }
            debug!("Cache miss: {}", key);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                outcome.diagnostics.push(Diagnostic::io_error(&key, e.to_string()));
                return Ok(());
            }
        };

        let extraction = self.parser.extract(&key, &content);
        outcome.extracted += 1;

        if let Some(cache) = &self.cache {
            let entry = if extraction.failed() {
                CacheEntry::failed(modified)
            } else {
                CacheEntry::new(modified, extraction.symbols.clone())
            };
            cache.put(&key, &entry)?;
        }

        for diagnostic in &extraction.diagnostics {
            warn!("{}", diagnostic);
        }

        outcome.symbols.extend(extraction.symbols);
        outcome.diagnostics.extend(extraction.diagnostics);
        Ok(())
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
}

/// Returns the orchestrator to `Idle` when the run ends, including by panic.
struct RunningGuard {
    state: Arc<Mutex<ScanState>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        *self.state.lock() = ScanState::Idle;
    }
}

/// Handle to a started scan
pub struct ScanTicket {
    pub events: mpsc::UnboundedReceiver<ScanEvent>,
    pub handle: JoinHandle<()>,
}

impl ScanTicket {
    /// Wait for the scan to end, discarding progress.
    pub async fn wait(mut self) -> std::result::Result<ScanSummary, Diagnostic> {
        while let Some(event) = self.events.recv().await {
            match event {
                ScanEvent::Progress(_) => {}
                ScanEvent::Finished(summary) => return Ok(summary),
                ScanEvent::Aborted(diagnostic) => return Err(diagnostic),
            }
        }
        Err(Diagnostic {
            kind: crate::error::DiagnosticKind::IoError,
            path: None,
            message: "scan task ended without a result".to_string(),
        })
    }
}

/// Single-flight background scanning for one workspace.
pub struct ScanOrchestrator {
    scanner: Arc<Scanner>,
    state: Arc<Mutex<ScanState>>,
    runtime: Handle,
}

impl ScanOrchestrator {
    pub fn new(scanner: Scanner, runtime: Handle) -> Self {
        Self {
            scanner: Arc::new(scanner),
            state: Arc::new(Mutex::new(ScanState::Idle)),
            runtime,
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Start `request` on the blocking pool and return immediately.
    ///
    /// Returns `None` without doing anything if a scan is already running.
    /// `on_complete` receives the outcome of a successful run; an aborted run
    /// never calls it.
    pub fn scan<F>(&self, request: ScanRequest, on_complete: F) -> Option<ScanTicket>
    where
        F: FnOnce(ScanOutcome) + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if *state == ScanState::Running {
                debug!("Scan already running, dropping {:?} request", request.scope);
                return None;
            }
            *state = ScanState::Running;
        }

        let guard = RunningGuard {
            state: Arc::clone(&self.state),
        };
        let scanner = Arc::clone(&self.scanner);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = self.runtime.spawn_blocking(move || {
            let result = scanner.run_scan(&request, |percent| {
                let _ = tx.send(ScanEvent::Progress(percent));
            });

            match result {
                Ok(outcome) => {
                    let summary = outcome.summary();
                    on_complete(outcome);
                    drop(guard);
                    let _ = tx.send(ScanEvent::Finished(summary));
                }
                Err(e) => {
                    error!("Scan aborted: {}", e);
                    drop(guard);
                    let _ = tx.send(ScanEvent::Aborted(e.to_diagnostic()));
                }
            }
        });

        Some(ScanTicket { events: rx, handle })
    }
}
