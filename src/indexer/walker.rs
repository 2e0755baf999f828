// Scan requests and candidate file resolution

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};
use crate::index::Parser;

/// Version-control metadata directories, never scanned.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Scope of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    /// Every root and open file; the result replaces the whole index.
    Full,
    /// One file; the result replaces only that file's entries.
    SingleFile,
}

/// What to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub files: Vec<PathBuf>,
    pub roots: Vec<PathBuf>,
    /// Path substrings; any candidate containing one is skipped.
    pub exclusions: Vec<String>,
    pub scope: ScanScope,
}

impl ScanRequest {
    pub fn full(roots: Vec<PathBuf>, files: Vec<PathBuf>, exclusions: Vec<String>) -> Self {
        Self {
            files,
            roots,
            exclusions,
            scope: ScanScope::Full,
        }
    }

    pub fn single_file(path: impl Into<PathBuf>) -> Self {
        Self {
            files: vec![path.into()],
            roots: Vec::new(),
            exclusions: Vec::new(),
            scope: ScanScope::SingleFile,
        }
    }

    /// Replace the exclusion substrings.
    pub fn excluding(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// Absolute form of `path`, used as the cache key and symbol file name.
pub fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn in_vcs_dir(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => VCS_DIRS.iter().any(|vcs| name == *vcs),
        _ => false,
    })
}

fn is_excluded(path: &Path, exclusions: &[String]) -> bool {
    let path = path.to_string_lossy();
    exclusions.iter().any(|exclusion| path.contains(exclusion.as_str()))
}

/// Whether `path` should be scanned at all.
pub fn is_candidate(path: &Path, exclusions: &[String], parser: &dyn Parser) -> bool {
    parser.can_parse(&path.to_string_lossy()) && !in_vcs_dir(path) && !is_excluded(path, exclusions)
}

/// Resolve `request` into an ordered, de-duplicated list of absolute file
/// paths: walk results first (sorted per directory), then explicit files.
///
/// Fails only when a root is not an existing directory.
pub fn resolve(request: &ScanRequest, parser: &dyn Parser) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for root in &request.roots {
        let root = normalize(root);
        if !root.is_dir() {
            return Err(IndexError::WalkRoot(root));
        }

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !in_vcs_dir(Path::new(entry.file_name())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if is_candidate(&path, &request.exclusions, parser) && seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }

    for file in &request.files {
        let path = normalize(file);
        if is_candidate(&path, &request.exclusions, parser) && seen.insert(path.clone()) {
            paths.push(path);
        }
    }

    debug!("Resolved {} candidate files", paths.len());
    Ok(paths)
}
