//! Matching communities between adjacent time slices

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::cluster::{CommunityBlock, CurveEndpoint, TransitionCurve};
use crate::data::{CommunityKey, NodeId, Slice, SliceIndex};

/// Jaccard index of two sets, 0 when both are empty
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

/// A plausible continuation of one community into the next slice
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMatch {
    pub source: CommunityKey,
    pub target: CommunityKey,
    pub similarity: f64,
    pub shared: Vec<NodeId>,
}

/// Every pair of communities between two adjacent slices whose Jaccard
/// similarity exceeds `threshold`.
///
/// All qualifying pairs are kept, so one source may fan out to several
/// targets (split) and several sources may converge on one target (merge).
pub fn match_slices(prev: &Slice, next: &Slice, threshold: f64) -> Vec<CommunityMatch> {
    let mut matches = Vec::new();

    for source in &prev.communities {
        for target in &next.communities {
            let similarity = jaccard(&source.members, &target.members);
            if similarity <= threshold {
                continue;
            }
            let shared: Vec<NodeId> = source
                .members
                .intersection(&target.members)
                .cloned()
                .collect();
            matches.push(CommunityMatch {
                source: CommunityKey::new(prev.time.clone(), source.id.clone()),
                target: CommunityKey::new(next.time.clone(), target.id.clone()),
                similarity,
                shared,
            });
        }
    }

    matches
}

/// Match every adjacent slice pair; entry `i` holds slice `i` to `i + 1`
pub fn track_slices(index: &SliceIndex, threshold: f64) -> Vec<Vec<CommunityMatch>> {
    let per_pair: Vec<Vec<CommunityMatch>> = index
        .slices
        .par_windows(2)
        .map(|pair| match_slices(&pair[0], &pair[1], threshold))
        .collect();

    for (i, matches) in per_pair.iter().enumerate() {
        log::debug!(
            "{} -> {}: {} matches above {}",
            index.slices[i].time,
            index.slices[i + 1].time,
            matches.len(),
            threshold
        );
    }

    per_pair
}

/// Identifier of a curve derived from its two endpoint communities
pub fn curve_id(source: &CommunityKey, target: &CommunityKey) -> String {
    format!("D{}_{}", source.community, target.community)
}

/// Turn matches into transition curves positioned against `blocks`.
///
/// A source with `k` qualifying matches shares its total overlap evenly,
/// so each curve carries `total_shared / k` and the outgoing weight of a
/// community does not depend on its branching factor.
pub fn transition_curves(
    matches: &[CommunityMatch],
    blocks: &[CommunityBlock],
) -> Vec<TransitionCurve> {
    let centers = block_centers(blocks);

    let mut fan_out: HashMap<&CommunityKey, (usize, usize)> = HashMap::new();
    for m in matches {
        let entry = fan_out.entry(&m.source).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += m.shared.len();
    }

    let mut curves = Vec::with_capacity(matches.len());
    for m in matches {
        let (Some(&source_y), Some(&target_y)) = (centers.get(&m.source), centers.get(&m.target))
        else {
            log::warn!("match {} -> {} has no block; dropped", m.source, m.target);
            continue;
        };

        let (k, total_shared) = fan_out[&m.source];
        let weight = total_shared as f64 / k as f64;

        curves.push(TransitionCurve {
            source: CurveEndpoint {
                time: m.source.time.clone(),
                y: source_y,
                community_id: m.source.community.clone(),
            },
            target: CurveEndpoint {
                time: m.target.time.clone(),
                y: target_y,
                community_id: m.target.community.clone(),
            },
            node_ids: m.shared.clone(),
            weight,
            rank: weight * m.shared.len() as f64,
            dynamic_community_id: curve_id(&m.source, &m.target),
        });
    }

    curves
}

/// Copies of `curves` with endpoint heights taken from re-laid-out `blocks`
pub fn reposition_curves(
    curves: &[TransitionCurve],
    blocks: &[CommunityBlock],
) -> Vec<TransitionCurve> {
    let centers = block_centers(blocks);
    curves
        .iter()
        .map(|curve| {
            let mut moved = curve.clone();
            if let Some(&y) = centers.get(&curve.source.key()) {
                moved.source.y = y;
            }
            if let Some(&y) = centers.get(&curve.target.key()) {
                moved.target.y = y;
            }
            moved
        })
        .collect()
}

fn block_centers(blocks: &[CommunityBlock]) -> HashMap<CommunityKey, f64> {
    blocks.iter().map(|b| (b.key(), b.center())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CommunityRecord, NodeRecord, TemporalGraph, TimeSlice};
    use proptest::prelude::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn membership(time: &str, cluster: &str, nodes: &[&str]) -> Vec<NodeRecord> {
        nodes
            .iter()
            .map(|n| NodeRecord::new(*n, time, cluster))
            .collect()
    }

    fn block(time: &str, id: &str, y0: f64, y1: f64) -> CommunityBlock {
        CommunityBlock {
            time: TimeSlice::from(time),
            community_id: id.to_string(),
            y0,
            y1,
            node_ids: Vec::new(),
            density: 0.5,
            stability: 0.5,
            label: id.to_string(),
            dynamic_community_id: None,
        }
    }

    #[test]
    fn jaccard_edge_cases() {
        let a = set(&["1", "2", "3"]);
        let empty = BTreeSet::<String>::new();
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&a, &empty), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert!((jaccard(&a, &set(&["3", "4"])) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn split_produces_two_curves_with_even_weight() {
        let c: Vec<String> = (0..10).map(|i| format!("n{i}")).collect();
        let c_refs: Vec<&str> = c.iter().map(|s| s.as_str()).collect();
        let mut nodes = membership("1", "C", &c_refs);
        nodes.extend(membership("2", "D", &c_refs[..6]));
        nodes.extend(membership("2", "E", &c_refs[6..]));
        let graph = TemporalGraph::new(
            nodes,
            Vec::new(),
            vec![
                CommunityRecord::new("1", "C"),
                CommunityRecord::new("2", "D"),
                CommunityRecord::new("2", "E"),
            ],
        );
        let index = SliceIndex::build(&graph);
        let matches = match_slices(&index.slices[0], &index.slices[1], 0.1);
        assert_eq!(matches.len(), 2);

        let blocks = vec![
            block("1", "C", 0.0, 1.0),
            block("2", "D", 0.0, 0.5),
            block("2", "E", 0.5, 1.0),
        ];
        let curves = transition_curves(&matches, &blocks);
        assert_eq!(curves.len(), 2);
        for curve in &curves {
            assert_eq!(curve.weight, 5.0);
        }
        let total: f64 = curves.iter().map(|c| c.weight).sum();
        assert_eq!(total, 10.0);
        assert_eq!(curves[0].dynamic_community_id, "DC_D");
        assert_eq!(curves[1].dynamic_community_id, "DC_E");
        assert_eq!(curves[0].rank, 5.0 * 6.0);
        assert_eq!(curves[1].target.y, 0.75);
    }

    #[test]
    fn merge_keeps_both_sources() {
        let mut nodes = membership("1", "A", &["a", "b"]);
        nodes.extend(membership("1", "B", &["c", "d"]));
        nodes.extend(membership("2", "M", &["a", "b", "c", "d"]));
        let graph = TemporalGraph::new(
            nodes,
            Vec::new(),
            vec![
                CommunityRecord::new("1", "A"),
                CommunityRecord::new("1", "B"),
                CommunityRecord::new("2", "M"),
            ],
        );
        let index = SliceIndex::build(&graph);
        let matches = match_slices(&index.slices[0], &index.slices[1], 0.1);
        let targets: Vec<&str> = matches.iter().map(|m| m.target.community.as_str()).collect();
        assert_eq!(targets, vec!["M", "M"]);
        assert!(matches.iter().all(|m| (m.similarity - 0.5).abs() < 1e-12));
    }

    #[test]
    fn threshold_is_strict_and_empty_target_slice_yields_nothing() {
        let mut nodes = membership("1", "A", &["a", "b", "c", "d"]);
        nodes.extend(membership("2", "B", &["d", "e", "f", "g", "h", "i", "j"]));
        let graph = TemporalGraph::new(
            nodes,
            Vec::new(),
            vec![CommunityRecord::new("1", "A"), CommunityRecord::new("2", "B")],
        );
        let index = SliceIndex::build(&graph);
        // similarity is exactly 0.1
        assert!(match_slices(&index.slices[0], &index.slices[1], 0.1).is_empty());
        assert_eq!(match_slices(&index.slices[0], &index.slices[1], 0.05).len(), 1);

        let empty = Slice::default();
        assert!(match_slices(&index.slices[0], &empty, 0.0).is_empty());
    }

    #[test]
    fn reposition_moves_only_heights() {
        let blocks = vec![block("1", "A", 0.0, 1.0), block("2", "B", 0.0, 0.5)];
        let curve = TransitionCurve {
            source: CurveEndpoint {
                time: TimeSlice::from("1"),
                y: 0.5,
                community_id: "A".to_string(),
            },
            target: CurveEndpoint {
                time: TimeSlice::from("2"),
                y: 0.75,
                community_id: "B".to_string(),
            },
            node_ids: vec!["x".to_string()],
            weight: 1.0,
            rank: 1.0,
            dynamic_community_id: "DA_B".to_string(),
        };
        let moved = reposition_curves(std::slice::from_ref(&curve), &blocks);
        assert_eq!(moved[0].target.y, 0.25);
        assert_eq!(moved[0].node_ids, curve.node_ids);
        assert_eq!(curve.target.y, 0.75);
    }

    proptest! {
        #[test]
        fn jaccard_is_bounded_and_symmetric(
            a in proptest::collection::btree_set(0u8..32, 0..20),
            b in proptest::collection::btree_set(0u8..32, 0..20),
        ) {
            let s = jaccard(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
            prop_assert_eq!(s, jaccard(&b, &a));
            if !a.is_empty() {
                prop_assert_eq!(jaccard(&a, &a), 1.0);
            }
        }
    }
}
