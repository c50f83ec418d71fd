use anyhow::Result;
use std::env;

use crate::search::{CrossLayerResult, SearchOptions};

use super::Workspace;

/// Run the entity command: one entity's representations across layers.
///
/// `limit` overrides the configured number of vector neighbours examined.
pub async fn run(name: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let cwd = env::current_dir()?;
    let workspace = Workspace::open(&cwd)?;
    let engine = workspace.engine();

    let mut options = SearchOptions::from(&workspace.config.search);
    if let Some(limit) = limit {
        options.entity_neighbours = limit;
    }
    let result = engine.find_cross_layer_entity(name, &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_report(&result));
    }

    Ok(())
}

fn format_report(result: &CrossLayerResult) -> String {
    let mut out = format!("Entity: {}\n", result.entity_name);
    out.push_str(&format!(
        "Architecture: {} (confidence {:.2})\n\n",
        result.architectural_pattern, result.total_confidence
    ));

    if result.matches.is_empty() {
        out.push_str("No representations found.\n");
    }

    let mut current_layer = None;
    for m in &result.matches {
        if current_layer != Some(m.layer) {
            out.push_str(&format!(
                "[{}] ({} matches)\n",
                m.layer,
                result.layer_counts.get(&m.layer).copied().unwrap_or(0)
            ));
            current_layer = Some(m.layer);
        }
        out.push_str(&format!(
            "  {} {} {}:{} ({:.2})\n",
            m.kind.as_str(),
            m.name,
            m.file_path,
            m.start_line,
            m.confidence
        ));
    }

    if !result.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for recommendation in &result.recommendations {
            out.push_str(&format!("  - {}\n", recommendation));
        }
    }
    out
}
