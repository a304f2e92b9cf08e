//! Results persistence module

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, to_string_pretty};

use crate::pipeline::FlowDiagram;

/// Save a flow diagram to the specified directory
pub fn save_results(diagram: &FlowDiagram, output_dir: &str) -> Result<()> {
    log::info!(
        "Saving {} blocks and {} curves to {}",
        diagram.blocks.len(),
        diagram.curves.len(),
        output_dir
    );

    fs::create_dir_all(output_dir)?;

    save_summary(diagram, output_dir)?;
    save_json(&diagram.blocks, output_dir, "blocks.json")?;
    save_json(&diagram.curves, output_dir, "curves.json")?;
    save_json(&diagram.dynamic_communities, output_dir, "dynamic_communities.json")?;
    save_json(&diagram.vertex_stabilities, output_dir, "vertex_stabilities.json")?;

    log::info!("Results saved successfully");

    Ok(())
}

fn save_json<T: Serialize + ?Sized>(value: &T, output_dir: &str, name: &str) -> Result<()> {
    let path = Path::new(output_dir).join(name);
    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(value)?.as_bytes())?;
    Ok(())
}

/// Save summary information
fn save_summary(diagram: &FlowDiagram, output_dir: &str) -> Result<()> {
    log::info!("Saving summary information");

    let block_count = diagram.blocks.len();

    let summary = json!({
        "timestamps": diagram.timestamps,
        "block_stats": {
            "block_count": block_count,
            "largest_block_size": diagram.blocks.iter().map(|b| b.size()).max().unwrap_or(0),
            "avg_block_size": mean(diagram.blocks.iter().map(|b| b.size() as f64)),
            "avg_density": mean(diagram.blocks.iter().map(|b| b.density)),
            "avg_stability": mean(diagram.blocks.iter().map(|b| b.stability)),
        },
        "curve_count": diagram.curves.len(),
        "dynamic_community_count": diagram.dynamic_communities.len(),
        "vertex_count": diagram.vertex_stabilities.len(),
        "avg_vertex_stability": mean(diagram.vertex_stabilities.iter().map(|v| v.stability)),
        "layout": diagram.layout,
    });

    save_json(&summary, output_dir, "summary.json")
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
