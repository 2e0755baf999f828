// Symbol data model and storage

pub mod db;
pub mod schema;
pub mod symbols;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;

pub use symbols::{Snapshot, SymbolIndex};

/// A named definition at a source location.
///
/// Serialized with the field names used by the cache and the extraction
/// stream: `{name, type, filename, line}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    #[serde(rename = "filename")]
    pub path: String,
    /// 1-based
    pub line: usize,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, path: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            line,
        }
    }

    /// `path:line`, the location form editors accept.
    pub fn location(&self) -> String {
        format!("{}:{}", self.path, self.line)
    }
}

// Display order: name, then location. Kind only breaks remaining ties.
impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.line.cmp(&other.line))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    GlobalAttribute,
    ClassAttribute,
    InstanceAttribute,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 6] = [
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Class,
        SymbolKind::GlobalAttribute,
        SymbolKind::ClassAttribute,
        SymbolKind::InstanceAttribute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::GlobalAttribute => "global-attribute",
            SymbolKind::ClassAttribute => "class-attribute",
            SymbolKind::InstanceAttribute => "instance-attribute",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of extracting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    /// True when the file's syntax was rejected.
    pub fn failed(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Parser trait for symbol extractors
pub trait Parser {
    fn can_parse(&self, file_path: &str) -> bool;

    /// Extract symbols from `content`. Never fails: malformed input yields an
    /// empty symbol list and a `ParseError` diagnostic.
    fn extract(&self, file_path: &str, content: &str) -> Extraction;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_serializes_with_cache_field_names() {
        let symbol = Symbol::new("x", SymbolKind::InstanceAttribute, "a.py", 5);
        let json = serde_json::to_value(&symbol).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "x",
                "type": "instance-attribute",
                "filename": "a.py",
                "line": 5
            })
        );
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(SymbolKind::parse("class-attribute"), Some(SymbolKind::ClassAttribute));
        assert_eq!(SymbolKind::parse("global-attr"), None);
    }

    #[test]
    fn test_ordering_is_by_name_then_location() {
        let mut symbols = vec![
            Symbol::new("b", SymbolKind::Function, "a.py", 1),
            Symbol::new("a", SymbolKind::Class, "z.py", 1),
            Symbol::new("a", SymbolKind::Function, "b.py", 9),
            Symbol::new("a", SymbolKind::Function, "b.py", 2),
        ];
        symbols.sort();
        let locations: Vec<_> = symbols.iter().map(|s| format!("{} {}", s.name, s.location())).collect();
        assert_eq!(locations, vec!["a b.py:2", "a b.py:9", "a z.py:1", "b a.py:1"]);
    }
}
