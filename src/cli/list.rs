use anyhow::Result;

use super::load_workspace;

pub async fn list_symbols(project: String) -> Result<()> {
    let (_, workspace) = load_workspace(&project).await?;

    let entries = workspace.query().list_for_display()?;
    let width = entries.iter().map(|entry| entry.label.len()).max().unwrap_or(0);

    for entry in entries {
        println!("{:<width$}  {:<18}  {}", entry.label, entry.kind.as_str(), entry.location, width = width);
    }

    Ok(())
}
