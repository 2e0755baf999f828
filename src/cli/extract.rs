use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pygoto::index::Symbol;
use pygoto::indexer::parser::PythonParser;
use pygoto::indexer::protocol::Record;
use pygoto::indexer::{ScanRequest, Scanner};

/// Run the standalone extraction tool. Records go to stdout, diagnostics to
/// stderr. Returns the process exit code.
pub fn run_extract(files: Vec<String>, dirs: Vec<String>, exclude: Vec<String>) -> Result<i32> {
    let request = ScanRequest::full(
        dirs.into_iter().map(PathBuf::from).collect(),
        files.into_iter().map(PathBuf::from).collect(),
        exclude,
    );
    info!("Extracting from {} roots and {} files", request.roots.len(), request.files.len());

    let scanner = Scanner::new(Arc::new(PythonParser::new()), None);
    let mut out = BufWriter::new(std::io::stdout().lock());

    let mut write_error = None;
    let result = scanner.run_scan_streaming(&request, |symbols, percent| {
        if write_error.is_some() {
            return;
        }
        if let Err(e) = write_file_records(&mut out, symbols, percent) {
            write_error = Some(e);
        }
    });
    if let Some(e) = write_error {
        return Err(e).context("Failed to write records");
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{}", e.to_diagnostic());
            return Ok(1);
        }
    };

    for diagnostic in &outcome.diagnostics {
        eprintln!("{}", diagnostic);
    }

    Ok(0)
}

/// One file's records: the progress record if it grew, then its symbols.
fn write_file_records(out: &mut impl Write, symbols: &[Symbol], percent: Option<u8>) -> std::io::Result<()> {
    if let Some(percent) = percent {
        writeln!(out, "{}", Record::Progress(percent))?;
    }
    for symbol in symbols {
        writeln!(out, "{}", Record::Symbol(symbol.clone()))?;
    }
    out.flush()
}
