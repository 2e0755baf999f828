use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pygoto::config::Config;
use pygoto::indexer::external::run_tool;
use pygoto::indexer::{ScanEvent, ScanRequest, ScanSummary};
use pygoto::workspace::Workspace;

use super::open_workspace;

pub async fn index_project(
    project: String,
    rebuild: bool,
    watch: bool,
    external: Option<String>,
) -> Result<()> {
    info!("Indexing project: {}", project);

    let (config, workspace) = open_workspace(&project)?;

    println!("pygoto v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", workspace.id());
    println!("Config: {}", if config.project.name != "unnamed-project" { "loaded" } else { "default" });

    match workspace.orchestrator().scanner().cache() {
        Some(cache) => {
            println!("Cache: {}", cache.path().display());
            if rebuild {
                cache.clear().context("Failed to clear cache")?;
                println!("Cache cleared");
            }
        }
        None => println!("Cache: disabled"),
    }

    let summary = match external {
        Some(program) => index_external(&workspace, &config, PathBuf::from(program)).await?,
        None => index_in_process(&workspace).await?,
    };

    println!("\nIndexing complete!");
    println!("Files: {}", summary.files);
    println!("Symbols: {}", summary.symbols);
    println!("Cache hits: {}", summary.cache_hits);
    println!("Extracted: {}", summary.extracted);
    if !summary.diagnostics.is_empty() {
        println!("Diagnostics: {}", summary.diagnostics.len());
        for diagnostic in &summary.diagnostics {
            eprintln!("  {}", diagnostic);
        }
    }

    if watch || config.indexing.watch {
        println!("\nWatching for file changes. Press Ctrl+C to stop.");
        pygoto::indexer::watcher::start_watcher(Arc::clone(&workspace), config.indexing.exclude.clone()).await?;
    }

    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}%")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

async fn index_in_process(workspace: &Workspace) -> Result<ScanSummary> {
    let mut ticket = workspace
        .scan_all()
        .ok_or_else(|| anyhow!("A scan is already running"))?;
    let bar = progress_bar()?;

    while let Some(event) = ticket.events.recv().await {
        match event {
            ScanEvent::Progress(percent) => bar.set_position(percent as u64),
            ScanEvent::Finished(summary) => {
                bar.finish_and_clear();
                return Ok(summary);
            }
            ScanEvent::Aborted(diagnostic) => {
                bar.abandon();
                return Err(anyhow!("Scan aborted: {}", diagnostic));
            }
        }
    }

    bar.abandon();
    Err(anyhow!("Scan ended without a result"))
}

/// Run a separate extraction tool over the workspace roots and load its
/// stream into the index.
async fn index_external(workspace: &Workspace, config: &Config, program: PathBuf) -> Result<ScanSummary> {
    let request = ScanRequest::full(workspace.roots(), Vec::new(), config.indexing.exclude.clone());
    let bar = progress_bar()?;

    let progress = bar.clone();
    let output = tokio::task::spawn_blocking(move || {
        run_tool(&program, &request, |percent| progress.set_position(percent as u64))
    })
    .await
    .context("Extraction task failed")?;

    // A failed run leaves the index as it was.
    let output = match output {
        Ok(output) => {
            bar.finish_and_clear();
            output
        }
        Err(e) => {
            bar.abandon();
            return Err(e).context("Failed to run extraction tool");
        }
    };

    let symbols: Vec<_> = output
        .symbols
        .into_iter()
        .filter(|symbol| config.should_index_file(&symbol.path))
        .collect();
    let files = symbols
        .iter()
        .map(|symbol| symbol.path.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    let summary = ScanSummary {
        symbols: symbols.len(),
        files,
        cache_hits: 0,
        extracted: files,
        diagnostics: output.diagnostics,
    };
    workspace.index().replace_all(symbols);

    Ok(summary)
}
