// Query execution over index snapshots

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::QueryError;
use crate::index::{Snapshot, Symbol, SymbolKind};

/// One row of the symbol picker: the name, and where to jump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub label: String,
    pub location: String,
    pub kind: SymbolKind,
}

impl From<&Symbol> for DisplayEntry {
    fn from(symbol: &Symbol) -> Self {
        Self {
            label: symbol.name.clone(),
            location: symbol.location(),
            kind: symbol.kind,
        }
    }
}

/// Query engine
pub struct QueryEngine {
    snapshot: Snapshot,
}

impl QueryEngine {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    fn symbols(&self) -> Result<&[Symbol], QueryError> {
        if !self.snapshot.is_loaded() {
            return Err(QueryError::NotLoaded);
        }
        Ok(self.snapshot.symbols())
    }

    /// Every definition named exactly `name`.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Symbol>, QueryError> {
        Ok(self
            .symbols()?
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect())
    }

    /// Definitions whose name contains `fragment`, ignoring case, sorted.
    pub fn find_matching(&self, fragment: &str) -> Result<Vec<Symbol>, QueryError> {
        let needle = fragment.to_lowercase();
        let mut matches: Vec<Symbol> = self
            .symbols()?
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort();
        Ok(matches)
    }

    /// All symbols ordered by name, then location.
    pub fn list_for_display(&self) -> Result<Vec<DisplayEntry>, QueryError> {
        let mut symbols: Vec<&Symbol> = self.symbols()?.iter().collect();
        symbols.sort();
        Ok(symbols.into_iter().map(DisplayEntry::from).collect())
    }

    pub fn count_by_kind(&self) -> Result<BTreeMap<SymbolKind, usize>, QueryError> {
        let mut counts = BTreeMap::new();
        for symbol in self.symbols()? {
            *counts.entry(symbol.kind).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolIndex;

    fn loaded_index() -> SymbolIndex {
        let index = SymbolIndex::new();
        index.replace_all(vec![
            Symbol::new("run", SymbolKind::Method, "/p/b.py", 10),
            Symbol::new("Runner", SymbolKind::Class, "/p/b.py", 1),
            Symbol::new("run", SymbolKind::Function, "/p/a.py", 3),
            Symbol::new("VERSION", SymbolKind::GlobalAttribute, "/p/a.py", 1),
        ]);
        index
    }

    #[test]
    fn test_not_loaded() {
        let engine = QueryEngine::new(SymbolIndex::new().snapshot());
        assert_eq!(engine.find_by_name("run"), Err(QueryError::NotLoaded));
        assert_eq!(engine.list_for_display(), Err(QueryError::NotLoaded));
    }

    #[test]
    fn test_loaded_but_empty_is_not_an_error() {
        let index = SymbolIndex::new();
        index.replace_all(Vec::new());
        let engine = QueryEngine::new(index.snapshot());
        assert_eq!(engine.find_by_name("run"), Ok(Vec::new()));
    }

    #[test]
    fn test_find_by_name_is_exact() {
        let engine = QueryEngine::new(loaded_index().snapshot());
        let found = engine.find_by_name("run").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.name == "run"));
        assert!(engine.find_by_name("ru").unwrap().is_empty());
    }

    #[test]
    fn test_find_matching_ignores_case() {
        let engine = QueryEngine::new(loaded_index().snapshot());
        let found: Vec<_> = engine
            .find_matching("RUN")
            .unwrap()
            .iter()
            .map(|s| s.location())
            .collect();
        assert_eq!(found, vec!["/p/b.py:1", "/p/a.py:3", "/p/b.py:10"]);
    }

    #[test]
    fn test_list_for_display() {
        let engine = QueryEngine::new(loaded_index().snapshot());
        let entries = engine.list_for_display().unwrap();
        let rows: Vec<_> = entries
            .iter()
            .map(|e| format!("{} {}", e.label, e.location))
            .collect();
        assert_eq!(
            rows,
            vec!["Runner /p/b.py:1", "VERSION /p/a.py:1", "run /p/a.py:3", "run /p/b.py:10"]
        );
    }

    #[test]
    fn test_count_by_kind() {
        let engine = QueryEngine::new(loaded_index().snapshot());
        let counts = engine.count_by_kind().unwrap();
        assert_eq!(counts[&SymbolKind::Method], 1);
        assert_eq!(counts[&SymbolKind::Function], 1);
        assert!(!counts.contains_key(&SymbolKind::InstanceAttribute));
    }
}
