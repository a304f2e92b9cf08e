//! Community and vertex metrics

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::cluster::tracker::jaccard;
use crate::cluster::{TimelineEntry, VertexStability};
use crate::data::{CommunityKey, NodeId, Slice, SliceIndex};

/// Value reported when a metric has nothing to measure
pub const NEUTRAL: f64 = 0.5;

/// Per-community metrics shown on a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommunityMetrics {
    pub density: f64,
    pub stability: f64,
}

/// Count edges whose endpoints share a cluster label, per label
fn internal_edge_counts(slice: &Slice) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (src, dst) in &slice.edges {
        let (Some(a), Some(b)) = (slice.assignments.get(src), slice.assignments.get(dst)) else {
            continue;
        };
        if a == b {
            *counts.entry(a.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

/// Internal edges over the `n * (n - 1) / 2` undirected pairs.
///
/// Communities with at most one member carry no signal and get [`NEUTRAL`].
pub fn density(size: usize, internal_edges: usize) -> f64 {
    if size <= 1 {
        return NEUTRAL;
    }
    let potential_edges = size * (size - 1) / 2;
    (internal_edges as f64 / potential_edges as f64).min(1.0)
}

/// Self-continuity of a raw community label at slice `position`: the mean
/// Jaccard similarity with the same label one slice before and after.
/// First and last slices get [`NEUTRAL`].
pub fn community_stability(index: &SliceIndex, position: usize, community_id: &str) -> f64 {
    let n = index.slices.len();
    if position == 0 || position + 1 >= n {
        return NEUTRAL;
    }

    let absent = BTreeSet::new();
    let members = |slice: usize| index.slices[slice].members(community_id).unwrap_or(&absent);

    let current = members(position);
    (jaccard(current, members(position - 1)) + jaccard(current, members(position + 1))) / 2.0
}

/// Density and stability for every non-empty community of every slice
pub fn calculate_community_metrics(index: &SliceIndex) -> HashMap<CommunityKey, CommunityMetrics> {
    let per_slice: Vec<Vec<(CommunityKey, CommunityMetrics)>> = index
        .slices
        .par_iter()
        .enumerate()
        .map(|(position, slice)| {
            let internal = internal_edge_counts(slice);
            slice
                .communities
                .iter()
                .map(|community| {
                    let edges = internal.get(community.id.as_str()).copied().unwrap_or(0);
                    let metrics = CommunityMetrics {
                        density: density(community.size(), edges),
                        stability: community_stability(index, position, &community.id),
                    };
                    (
                        CommunityKey::new(slice.time.clone(), community.id.clone()),
                        metrics,
                    )
                })
                .collect()
        })
        .collect();

    per_slice.into_iter().flatten().collect()
}

/// Fraction of consecutive appearances in which a node keeps its cluster
/// label. Nodes seen at a single slice get [`NEUTRAL`].
pub fn node_stability(clusters: &[&str]) -> f64 {
    if clusters.len() <= 1 {
        return NEUTRAL;
    }
    let unchanged = clusters.windows(2).filter(|pair| pair[0] == pair[1]).count();
    unchanged as f64 / (clusters.len() - 1) as f64
}

/// One stability entry per distinct node id, sorted by id
pub fn calculate_vertex_stabilities(index: &SliceIndex) -> Vec<VertexStability> {
    index
        .node_timelines()
        .into_iter()
        .map(|(node, clusters)| VertexStability {
            node_id: node.to_string(),
            stability: node_stability(&clusters),
        })
        .collect()
}

/// Mean Jaccard similarity between consecutive timeline entries, using raw
/// memberships. A step into or out of a gap contributes 0; timelines with
/// at most one entry get [`NEUTRAL`].
pub fn dynamic_stability(index: &SliceIndex, timeline: &[TimelineEntry]) -> f64 {
    if timeline.len() <= 1 {
        return NEUTRAL;
    }

    let total: f64 = timeline
        .windows(2)
        .map(|pair| match (entry_members(index, &pair[0]), entry_members(index, &pair[1])) {
            (Some(a), Some(b)) => jaccard(a, b),
            _ => 0.0,
        })
        .sum();

    total / (timeline.len() - 1) as f64
}

fn entry_members<'a>(index: &'a SliceIndex, entry: &TimelineEntry) -> Option<&'a BTreeSet<NodeId>> {
    let community = entry.community_id.as_deref()?;
    let position = index.position(&entry.time)?;
    index.slices[position].members(community)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CommunityRecord, EdgeRecord, NodeRecord, TemporalGraph, TimeSlice};

    fn graph() -> TemporalGraph {
        let mut nodes = Vec::new();
        for (time, cluster, members) in [
            ("1", "C1", vec!["a", "b", "c"]),
            ("1", "C2", vec!["d"]),
            ("2", "C1", vec!["a", "b"]),
            ("2", "C2", vec!["c", "d"]),
            ("3", "C1", vec!["a", "b", "c"]),
        ] {
            for node in members {
                nodes.push(NodeRecord::new(node, time, cluster));
            }
        }
        let edges = vec![
            EdgeRecord::new("a", "b", "1"),
            EdgeRecord::new("b", "c", "1"),
            EdgeRecord::new("c", "d", "1"),
            EdgeRecord::new("a", "missing", "1"),
        ];
        let communities = vec![
            CommunityRecord::new("1", "C1"),
            CommunityRecord::new("1", "C2"),
            CommunityRecord::new("2", "C1"),
            CommunityRecord::new("2", "C2"),
            CommunityRecord::new("3", "C1"),
        ];
        TemporalGraph::new(nodes, edges, communities)
    }

    fn key(time: &str, id: &str) -> CommunityKey {
        CommunityKey::new(TimeSlice::from(time), id)
    }

    #[test]
    fn density_counts_internal_undirected_edges() {
        let index = SliceIndex::build(&graph());
        let metrics = calculate_community_metrics(&index);
        // 2 internal edges over 3 possible pairs
        assert!((metrics[&key("1", "C1")].density - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics[&key("1", "C2")].density, NEUTRAL);
        // no edges recorded at slice 2
        assert_eq!(metrics[&key("2", "C1")].density, 0.0);
    }

    #[test]
    fn stability_is_neutral_on_boundaries() {
        let index = SliceIndex::build(&graph());
        let metrics = calculate_community_metrics(&index);
        assert_eq!(metrics[&key("1", "C1")].stability, NEUTRAL);
        assert_eq!(metrics[&key("3", "C1")].stability, NEUTRAL);
    }

    #[test]
    fn interior_stability_averages_both_neighbours() {
        let index = SliceIndex::build(&graph());
        // C1@2 = {a,b}: vs {a,b,c} twice -> 2/3 each
        assert!((community_stability(&index, 1, "C1") - 2.0 / 3.0).abs() < 1e-12);
        // C2@2 = {c,d}: vs {d} -> 1/2, vs absent -> 0
        assert!((community_stability(&index, 1, "C2") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn vertex_stability_counts_unchanged_pairs() {
        let index = SliceIndex::build(&graph());
        let stabilities = calculate_vertex_stabilities(&index);
        let by_node: HashMap<&str, f64> = stabilities
            .iter()
            .map(|v| (v.node_id.as_str(), v.stability))
            .collect();
        assert_eq!(by_node["a"], 1.0);
        // c: C1 -> C2 -> C1
        assert_eq!(by_node["c"], 0.0);
        // d: C2 -> C2
        assert_eq!(by_node["d"], 1.0);
        assert_eq!(stabilities.len(), 4);
        assert_eq!(node_stability(&["X"]), NEUTRAL);
    }

    #[test]
    fn dynamic_stability_treats_gaps_as_zero() {
        let index = SliceIndex::build(&graph());
        let entry = |time: &str, id: Option<&str>| TimelineEntry {
            time: TimeSlice::from(time),
            community_id: id.map(str::to_string),
        };

        let full = vec![entry("1", Some("C1")), entry("2", Some("C1")), entry("3", Some("C1"))];
        assert!((dynamic_stability(&index, &full) - 2.0 / 3.0).abs() < 1e-12);

        let gapped = vec![entry("1", Some("C2")), entry("2", None), entry("3", Some("C1"))];
        assert_eq!(dynamic_stability(&index, &gapped), 0.0);

        assert_eq!(dynamic_stability(&index, &full[..1]), NEUTRAL);
    }
}
