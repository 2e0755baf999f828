use anyhow::Result;

use crate::OutputFormat;

use super::load_workspace;

pub async fn find_symbols(name: String, project: String, substring: bool, format: OutputFormat) -> Result<()> {
    let (_, workspace) = load_workspace(&project).await?;
    let query = workspace.query();

    let results = if substring {
        query.find_matching(&name)?
    } else {
        query.find_by_name(&name)?
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No definitions found for '{}'", name);
                return Ok(());
            }
            println!("Found {} definitions:", results.len());
            for symbol in results {
                println!("  {} - {} ({})", symbol.location(), symbol.name, symbol.kind);
            }
        }
    }

    Ok(())
}
