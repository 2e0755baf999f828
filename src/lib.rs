// pygoto: Python symbol index for go-to-definition

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod query;
pub mod workspace;

pub use error::{Diagnostic, DiagnosticKind, IndexError, QueryError};
pub use index::{Symbol, SymbolIndex, SymbolKind};
pub use query::QueryEngine;
pub use workspace::{Workspace, WorkspaceRegistry, WorkspaceSettings};
