//! CSV / Parquet loading of the three record streams
//!
//! Tables are read as strings. Expected columns:
//! - nodes: `node_id, time, cluster` and optionally `x, y, label`
//! - edges: `src, dst, time`
//! - communities: `time, community_id` and optionally `size, label`

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;

use super::{CommunityRecord, EdgeRecord, NodeAttributes, NodeRecord, TemporalGraph};

/// Read a table by extension: `.parquet` is scanned as Parquet, anything
/// else as a CSV with a header row
pub fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }

    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));

    let frame = if is_parquet {
        log::info!("Reading parquet file: {}", path.display());
        LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
    } else {
        log::info!("Reading csv file: {}", path.display());
        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
    };

    let df = frame
        .collect()
        .with_context(|| format!("reading {}", path.display()))?;
    log::debug!("{} schema: {:?}", path.display(), df.schema());
    Ok(df)
}

fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .with_context(|| format!("missing column `{name}`"))?;
    Ok(column.cast(&DataType::String)?.str()?.clone())
}

fn optional_string_column(df: &DataFrame, name: &str) -> Result<Option<StringChunked>> {
    if df.get_column_index(name).is_none() {
        return Ok(None);
    }
    string_column(df, name).map(Some)
}

fn parse_optional<T: std::str::FromStr>(column: &Option<StringChunked>, row: usize) -> Option<T> {
    column
        .as_ref()
        .and_then(|c| c.get(row))
        .and_then(|v| v.trim().parse().ok())
}

pub fn nodes_from_frame(df: &DataFrame) -> Result<Vec<NodeRecord>> {
    let node_id = string_column(df, "node_id")?;
    let time = string_column(df, "time")?;
    let cluster = string_column(df, "cluster")?;
    let x = optional_string_column(df, "x")?;
    let y = optional_string_column(df, "y")?;
    let label = optional_string_column(df, "label")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0;
    for i in 0..df.height() {
        let (Some(n), Some(t), Some(c)) = (node_id.get(i), time.get(i), cluster.get(i)) else {
            skipped += 1;
            continue;
        };
        let mut record = NodeRecord::new(n, t, c);
        record.attributes = NodeAttributes {
            x: parse_optional(&x, i),
            y: parse_optional(&y, i),
            label: label.as_ref().and_then(|l| l.get(i)).map(str::to_string),
        };
        records.push(record);
    }

    if skipped > 0 {
        log::warn!("Skipped {} node rows with missing fields", skipped);
    }
    Ok(records)
}

pub fn edges_from_frame(df: &DataFrame) -> Result<Vec<EdgeRecord>> {
    let src = string_column(df, "src")?;
    let dst = string_column(df, "dst")?;
    let time = string_column(df, "time")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0;
    for i in 0..df.height() {
        match (src.get(i), dst.get(i), time.get(i)) {
            (Some(s), Some(d), Some(t)) => records.push(EdgeRecord::new(s, d, t)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} edge rows with missing fields", skipped);
    }
    Ok(records)
}

pub fn communities_from_frame(df: &DataFrame) -> Result<Vec<CommunityRecord>> {
    let time = string_column(df, "time")?;
    let community_id = string_column(df, "community_id")?;
    let size = optional_string_column(df, "size")?;
    let label = optional_string_column(df, "label")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0;
    for i in 0..df.height() {
        let (Some(t), Some(c)) = (time.get(i), community_id.get(i)) else {
            skipped += 1;
            continue;
        };
        let mut record = CommunityRecord::new(t, c);
        record.size = parse_optional(&size, i);
        if let Some(l) = label.as_ref().and_then(|l| l.get(i)) {
            record.label = l.to_string();
        }
        records.push(record);
    }

    if skipped > 0 {
        log::warn!("Skipped {} community rows with missing fields", skipped);
    }
    Ok(records)
}

/// Load all three tables into a [`TemporalGraph`]
pub fn load_temporal_graph(
    nodes: &Path,
    edges: &Path,
    communities: &Path,
) -> Result<TemporalGraph> {
    let nodes = nodes_from_frame(&read_table(nodes)?).context("loading nodes")?;
    let edges = edges_from_frame(&read_table(edges)?).context("loading edges")?;
    let communities =
        communities_from_frame(&read_table(communities)?).context("loading communities")?;

    log::info!(
        "Loaded {} node records, {} edges, {} communities",
        nodes.len(),
        edges.len(),
        communities.len()
    );

    Ok(TemporalGraph::new(nodes, edges, communities))
}
