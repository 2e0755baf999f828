// Delegated extraction through a separate process

use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::protocol::{read_stream, StreamOutput};
use super::walker::ScanRequest;
use crate::error::{IndexError, Result};

/// Command-line arguments for an extraction tool run covering `request`.
pub fn tool_args(request: &ScanRequest) -> Vec<String> {
    let mut args = vec!["extract".to_string()];
    for root in &request.roots {
        args.push("-d".to_string());
        args.push(root.to_string_lossy().to_string());
    }
    for file in &request.files {
        args.push("-f".to_string());
        args.push(file.to_string_lossy().to_string());
    }
    for exclusion in &request.exclusions {
        args.push("-x".to_string());
        args.push(exclusion.clone());
    }
    args
}

/// Run `program extract ...` and collect its stream.
///
/// Failing to start the process or a non-zero exit is an error and the
/// stream is discarded; malformed output lines come back as diagnostics.
pub fn run_tool(program: &Path, request: &ScanRequest, on_progress: impl FnMut(u8)) -> Result<StreamOutput> {
    let args = tool_args(request);
    info!("Running extraction tool: {} {}", program.display(), args.join(" "));

    let mut child = Command::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| IndexError::io(program, e))?;

    let stderr = child.stderr.take();
    let stderr_reader = std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text);
        }
        text
    });

    let output = match child.stdout.take() {
        Some(stdout) => read_stream(BufReader::new(stdout), on_progress),
        None => StreamOutput::default(),
    };

    let status = child.wait().map_err(|e| IndexError::io(program, e))?;
    let errors = stderr_reader.join().unwrap_or_default();
    for line in errors.lines().filter(|l| !l.trim().is_empty()) {
        warn!("extraction tool: {}", line);
    }

    if !status.success() {
        return Err(IndexError::ToolFailed {
            program: program.to_path_buf(),
            status,
        });
    }

    debug!(
        "Extraction tool exited with {}: {} symbols, {} diagnostics",
        status,
        output.symbols.len(),
        output.diagnostics.len()
    );

    Ok(output)
}
