// Per-workspace state: one index, cache and orchestrator per open project

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::index::db::CacheStore;
use crate::index::{Parser, SymbolIndex};
use crate::indexer::parser::PythonParser;
use crate::indexer::walker::normalize;
use crate::indexer::{ScanOrchestrator, ScanRequest, ScanTicket, Scanner};
use crate::query::engine::QueryEngine;

/// Settings a workspace is opened with
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSettings {
    pub roots: Vec<PathBuf>,
    pub exclusions: Vec<String>,
    /// `None` disables the persistent cache.
    pub cache_path: Option<PathBuf>,
}

impl WorkspaceSettings {
    /// Settings for a project directory from its configuration.
    pub fn from_config(project_dir: &Path, config: &Config) -> Self {
        let mut roots = vec![project_dir.to_path_buf()];
        roots.extend(config.indexing.roots.iter().map(|root| project_dir.join(root)));

        Self {
            roots,
            exclusions: config.indexing.exclude.clone(),
            cache_path: config
                .cache
                .enabled
                .then(|| project_dir.join(&config.cache.path)),
        }
    }
}

#[derive(Debug, Default)]
struct Tracked {
    roots: Vec<PathBuf>,
    exclusions: Vec<String>,
    open_files: BTreeSet<PathBuf>,
}

/// The symbol index of one project, and the means to keep it current.
pub struct Workspace {
    id: String,
    index: Arc<SymbolIndex>,
    orchestrator: ScanOrchestrator,
    tracked: RwLock<Tracked>,
}

impl Workspace {
    /// Open a workspace. Must be called within a tokio runtime.
    pub fn open(id: impl Into<String>, settings: WorkspaceSettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| IndexError::Runtime(e.to_string()))?;
        Self::with_parser(id, settings, Arc::new(PythonParser::new()), runtime)
    }

    pub fn with_parser(
        id: impl Into<String>,
        settings: WorkspaceSettings,
        parser: Arc<dyn Parser + Send + Sync>,
        runtime: Handle,
    ) -> Result<Self> {
        let id = id.into();
        let cache = settings.cache_path.as_ref().map(CacheStore::open).transpose()?;

        info!("Opening workspace {} with {} roots", id, settings.roots.len());

        Ok(Self {
            id,
            index: Arc::new(SymbolIndex::new()),
            orchestrator: ScanOrchestrator::new(Scanner::new(parser, cache), runtime),
            tracked: RwLock::new(Tracked {
                roots: settings.roots.iter().map(|r| normalize(r)).collect(),
                exclusions: settings.exclusions,
                open_files: BTreeSet::new(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    pub fn query(&self) -> QueryEngine {
        QueryEngine::new(self.index.snapshot())
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.tracked.read().roots.clone()
    }

    /// Full scan of every root plus every open file; replaces the whole index.
    pub fn scan_all(&self) -> Option<ScanTicket> {
        let request = {
            let tracked = self.tracked.read();
            ScanRequest::full(
                tracked.roots.clone(),
                tracked.open_files.iter().cloned().collect(),
                tracked.exclusions.clone(),
            )
        };

        let index = Arc::clone(&self.index);
        self.orchestrator
            .scan(request, move |outcome| index.replace_all(outcome.symbols))
    }

    /// Rescan one file; replaces only that file's entries.
    pub fn scan_file(&self, path: &Path) -> Option<ScanTicket> {
        let path = normalize(path);
        let key = path.to_string_lossy().to_string();

        let request = ScanRequest::single_file(path).excluding(self.tracked.read().exclusions.clone());

        let index = Arc::clone(&self.index);
        self.orchestrator.scan(request, move |outcome| {
            index.replace_file(&key, outcome.symbols)
        })
    }

    /// A file was opened. Runs a full scan if nothing is loaded yet or the
    /// roots changed, otherwise rescans just that file.
    pub fn file_opened(&self, path: &Path, roots: &[PathBuf]) -> Option<ScanTicket> {
        let roots: Vec<PathBuf> = roots.iter().map(|r| normalize(r)).collect();
        let roots_changed = {
            let mut tracked = self.tracked.write();
            tracked.open_files.insert(normalize(path));
            let changed = tracked.roots != roots;
            if changed {
                tracked.roots = roots;
            }
            changed
        };

        if !self.index.is_loaded() || roots_changed {
            debug!("Workspace {}: full scan on open of {}", self.id, path.display());
            self.scan_all()
        } else {
            self.scan_file(path)
        }
    }

    pub fn file_saved(&self, path: &Path) -> Option<ScanTicket> {
        self.scan_file(path)
    }

    /// A file was closed. Its symbols are dropped only when it lies outside
    /// every root; files inside a root stay indexed.
    pub fn file_closed(&self, path: &Path) {
        let path = normalize(path);
        let inside_root = {
            let mut tracked = self.tracked.write();
            tracked.open_files.remove(&path);
            tracked.roots.iter().any(|root| path.starts_with(root))
        };

        if !inside_root {
            self.index.remove_file(&path.to_string_lossy());
        }
    }

    /// A file disappeared from disk.
    pub fn file_removed(&self, path: &Path) {
        let path = normalize(path);
        self.tracked.write().open_files.remove(&path);
        self.index.remove_file(&path.to_string_lossy());
    }
}

/// Workspaces by identifier. Each one owns its own index and cache.
#[derive(Default)]
pub struct WorkspaceRegistry {
    workspaces: DashMap<String, Arc<Workspace>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The workspace for `id`, opened with `settings` on first use.
    pub fn get_or_open(&self, id: &str, settings: impl FnOnce() -> WorkspaceSettings) -> Result<Arc<Workspace>> {
        if let Some(workspace) = self.workspaces.get(id) {
            return Ok(Arc::clone(workspace.value()));
        }

        let entry = self.workspaces.entry(id.to_string());
        let workspace = match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let workspace = Arc::new(Workspace::open(id, settings())?);
                vacant.insert(Arc::clone(&workspace));
                workspace
            }
        };
        Ok(workspace)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Workspace>> {
        self.workspaces.get(id).map(|w| Arc::clone(w.value()))
    }

    /// Drop a workspace and everything it owns.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.workspaces.remove(id).is_some();
        if removed {
            info!("Closed workspace {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}
