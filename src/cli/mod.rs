// CLI command implementations

pub mod extract;
pub mod find;
pub mod index;
pub mod list;
pub mod stats;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use pygoto::config::Config;
use pygoto::indexer::walker::normalize;
use pygoto::workspace::{Workspace, WorkspaceSettings};

/// Open the workspace rooted at `project` with its configuration.
pub fn open_workspace(project: &str) -> Result<(Config, Arc<Workspace>)> {
    let project_dir = normalize(Path::new(project));
    if !project_dir.is_dir() {
        return Err(anyhow!("Project directory not found: {}", project_dir.display()));
    }

    let config = Config::from_project_dir(&project_dir);
    let settings = WorkspaceSettings::from_config(&project_dir, &config);
    let workspace = Workspace::open(project_dir.to_string_lossy(), settings)
        .with_context(|| format!("Failed to open workspace for {}", project_dir.display()))?;

    Ok((config, Arc::new(workspace)))
}

/// Open the workspace and load its index, reusing the cache where fresh.
pub async fn load_workspace(project: &str) -> Result<(Config, Arc<Workspace>)> {
    let (config, workspace) = open_workspace(project)?;

    let ticket = workspace
        .scan_all()
        .ok_or_else(|| anyhow!("A scan is already running"))?;
    let summary = ticket
        .wait()
        .await
        .map_err(|diagnostic| anyhow!("Scan aborted: {}", diagnostic))?;

    for diagnostic in &summary.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }

    Ok((config, workspace))
}
