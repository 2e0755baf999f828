// In-memory symbol table

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::Symbol;

/// Point-in-time view of a [`SymbolIndex`]. Cheap to clone, never changes.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    symbols: Arc<Vec<Symbol>>,
    loaded: bool,
}

impl Snapshot {
    pub fn new(symbols: Vec<Symbol>, loaded: bool) -> Self {
        Self {
            symbols: Arc::new(symbols),
            loaded,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// False until the first full scan has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// The current symbol set of one workspace.
///
/// Writers build a new table and swap it in under the write lock; readers
/// clone the `Arc` under the read lock. A snapshot therefore sees a file's
/// symbols either entirely before or entirely after an update.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    table: RwLock<Arc<Vec<Symbol>>>,
    loaded: AtomicBool,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Swap in a complete table, de-duplicated and stably sorted by name.
    pub fn replace_all(&self, symbols: Vec<Symbol>) {
        let mut symbols = dedup(symbols);
        symbols.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Replacing symbol table: {} symbols", symbols.len());

        *self.table.write() = Arc::new(symbols);
        self.loaded.store(true, Ordering::Release);
    }

    /// Drop every entry for `path`, then add `symbols`.
    pub fn replace_file(&self, path: &str, symbols: Vec<Symbol>) {
        let mut table = self.table.write();

        let mut seen = HashSet::new();
        let next: Vec<Symbol> = table
            .iter()
            .filter(|s| s.path != path)
            .cloned()
            .chain(symbols)
            .filter(|s| seen.insert(s.clone()))
            .collect();

        debug!("Replaced symbols for {}: {} total", path, next.len());
        *table = Arc::new(next);
    }

    /// Drop every entry for `path`.
    pub fn remove_file(&self, path: &str) {
        let mut table = self.table.write();
        if !table.iter().any(|s| s.path == path) {
            return;
        }

        let next: Vec<Symbol> = table.iter().filter(|s| s.path != path).cloned().collect();
        debug!("Removed symbols for {}: {} remain", path, next.len());
        *table = Arc::new(next);
    }

    pub fn snapshot(&self) -> Snapshot {
        let symbols = Arc::clone(&*self.table.read());
        Snapshot {
            symbols,
            loaded: self.is_loaded(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

fn dedup(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolKind;
    use std::thread;

    fn sym(name: &str, path: &str, line: usize) -> Symbol {
        Symbol::new(name, SymbolKind::Function, path, line)
    }

    #[test]
    fn test_replace_all_dedups_and_sorts() {
        let index = SymbolIndex::new();
        assert!(!index.is_loaded());

        index.replace_all(vec![
            sym("zeta", "a.py", 1),
            sym("alpha", "b.py", 3),
            sym("zeta", "a.py", 1),
            sym("alpha", "a.py", 7),
        ]);

        let snapshot = index.snapshot();
        assert!(snapshot.is_loaded());
        let names: Vec<_> = snapshot.symbols().iter().map(|s| s.location()).collect();
        // stable: both "alpha" entries keep their input order
        assert_eq!(names, vec!["b.py:3", "a.py:7", "a.py:1"]);
    }

    #[test]
    fn test_replace_file_drops_previous_entries() {
        let index = SymbolIndex::new();
        index.replace_all(vec![sym("old", "a.py", 1), sym("keep", "b.py", 1)]);

        index.replace_file("a.py", vec![sym("new", "a.py", 2)]);
        index.replace_file("a.py", vec![sym("newer", "a.py", 4), sym("newer", "a.py", 4)]);

        let snapshot = index.snapshot();
        let in_a: Vec<_> = snapshot.symbols().iter().filter(|s| s.path == "a.py").collect();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].name, "newer");
        assert!(snapshot.symbols().iter().any(|s| s.name == "keep"));
    }

    #[test]
    fn test_remove_file() {
        let index = SymbolIndex::new();
        index.replace_all(vec![sym("a", "a.py", 1), sym("b", "a.py", 2), sym("c", "c.py", 1)]);

        index.remove_file("a.py");

        let snapshot = index.snapshot();
        assert!(snapshot.symbols().iter().all(|s| s.path != "a.py"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.symbols()[0].name, "c");
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let index = SymbolIndex::new();
        index.replace_all(vec![sym("a", "a.py", 1)]);

        let before = index.snapshot();
        index.replace_file("a.py", vec![sym("b", "a.py", 1)]);

        assert_eq!(before.symbols()[0].name, "a");
        assert_eq!(index.snapshot().symbols()[0].name, "b");
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_file() {
        let index = Arc::new(SymbolIndex::new());
        index.replace_all((1..=10).map(|line| sym("v0", "a.py", line)).collect());

        let writer = {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for generation in 1..200 {
                    let name = format!("v{}", generation);
                    index.replace_file("a.py", (1..=10).map(|line| sym(&name, "a.py", line)).collect());
                }
            })
        };

        for _ in 0..200 {
            let snapshot = index.snapshot();
            let names: HashSet<_> = snapshot.symbols().iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names.len(), 1, "mixed generations: {:?}", names);
            assert_eq!(snapshot.len(), 10);
        }

        writer.join().unwrap();
    }
}
