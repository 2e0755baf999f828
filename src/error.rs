// Error taxonomy for the indexing engine

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that abort a whole operation (a scan run, opening a store).
///
/// Per-file problems are not errors; they are reported as [`Diagnostic`]s and
/// the scan carries on.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan root does not exist or is not a directory: {0}")]
    WalkRoot(PathBuf),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Extraction tool {} exited with {status}", program.display())]
    ToolFailed {
        program: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The diagnostic reported when this error aborts a scan run.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let path = match self {
            Self::Io { path, .. } | Self::WalkRoot(path) => Some(path.display().to_string()),
            _ => None,
        };
        Diagnostic {
            kind: DiagnosticKind::IoError,
            path,
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by the query interface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Symbols haven't been loaded yet, please try again in a few moments")]
    NotLoaded,
}

/// Diagnostic categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The file's syntax could not be parsed.
    ParseError,
    /// A file could not be read, or a scan could not proceed.
    IoError,
    /// A malformed record in a delegated extraction stream.
    ProtocolError,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseError => "parse error",
            DiagnosticKind::IoError => "io error",
            DiagnosticKind::ProtocolError => "protocol error",
        }
    }
}

/// A recorded, non-fatal problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn parse_error(path: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ParseError,
            path: Some(path.to_string()),
            message: message.into(),
        }
    }

    pub fn io_error(path: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::IoError,
            path: Some(path.to_string()),
            message: message.into(),
        }
    }

    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ProtocolError,
            path: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {} in '{}'", self.kind.as_str(), self.message, path),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}
