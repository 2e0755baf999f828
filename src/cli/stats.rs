use anyhow::Result;
use std::path::Path;

use pygoto::index::SymbolKind;

use super::load_workspace;

pub async fn show_stats(project: String) -> Result<()> {
    let (config, workspace) = load_workspace(&project).await?;

    println!("pygoto Statistics v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", workspace.id());
    println!("Config: {}", if config.project.name != "unnamed-project" { "loaded" } else { "default" });

    let counts = workspace.query().count_by_kind()?;
    println!("\nIndex Statistics:");
    println!("  Total symbols: {}", workspace.index().len());
    for kind in SymbolKind::ALL {
        println!("    {}: {}", kind, counts.get(&kind).copied().unwrap_or(0));
    }

    if let Some(cache) = workspace.orchestrator().scanner().cache() {
        let stats = cache.stats()?;
        println!("\nCache Statistics:");
        println!("  Entries: {}", stats.entries);
        println!("  Failed parses: {}", stats.failed_entries);
        println!("  Cache size: {:.2} MB", get_db_size(cache.path())?);
    }

    Ok(())
}

fn get_db_size(db_path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(db_path)?;
    let size_bytes = metadata.len() as f64;
    let size_mb = size_bytes / (1024.0 * 1024.0);
    Ok(size_mb)
}
