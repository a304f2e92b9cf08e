//! Assembling persistent dynamic communities across slices

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cluster::metrics::dynamic_stability;
use crate::cluster::tracker::CommunityMatch;
use crate::cluster::{DynamicCommunity, TimelineEntry};
use crate::config::IdentityPolicy;
use crate::data::{CommunityKey, SliceIndex};
use crate::viz::{dynamic_community_color, IdRange};

/// Dynamic identities and the community occurrences they own
#[derive(Debug, Clone, Default)]
pub struct DynamicAssembly {
    /// Identity of every non-empty community occurrence
    pub assignment: HashMap<CommunityKey, u32>,

    /// Sorted by id
    pub communities: Vec<DynamicCommunity>,
}

/// Every `(time, community_id)` shares an identity with all earlier
/// occurrences of the same raw id. Ids are numbered by first appearance.
pub fn assign_by_raw_label(index: &SliceIndex) -> HashMap<CommunityKey, u32> {
    let mut by_label: HashMap<&str, u32> = HashMap::new();
    let mut assignment = HashMap::new();

    for slice in &index.slices {
        for community in &slice.communities {
            let next_id = by_label.len() as u32 + 1;
            let id = *by_label.entry(community.id.as_str()).or_insert(next_id);
            assignment.insert(
                CommunityKey::new(slice.time.clone(), community.id.clone()),
                id,
            );
        }
    }

    assignment
}

/// Identities follow tracked matches with similarity of at least
/// `track_threshold`.
///
/// Communities of the first slice open ids 1..n in roster order. At each
/// later slice the candidate links are granted by descending similarity
/// (ties in roster order); an identity continues into at most one
/// community and a community inherits at most one identity. Anything left
/// unlinked opens a fresh id, so a chain that finds no successor goes
/// extinct.
pub fn assign_by_tracked_chain(
    index: &SliceIndex,
    matches: &[Vec<CommunityMatch>],
    track_threshold: f64,
) -> HashMap<CommunityKey, u32> {
    let mut assignment: HashMap<CommunityKey, u32> = HashMap::new();
    let mut next_id = 1u32;

    for (position, slice) in index.slices.iter().enumerate() {
        let mut inherited: HashMap<&str, u32> = HashMap::new();

        if position > 0 {
            let prev = &index.slices[position - 1];
            let prev_rank: HashMap<&str, usize> = prev
                .communities
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id.as_str(), i))
                .collect();
            let rank: HashMap<&str, usize> = slice
                .communities
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id.as_str(), i))
                .collect();

            let mut links: Vec<&CommunityMatch> = matches
                .get(position - 1)
                .map(|m| m.iter().filter(|m| m.similarity >= track_threshold).collect())
                .unwrap_or_default();
            links.sort_by(|a, b| {
                b.similarity
                    .total_cmp(&a.similarity)
                    .then_with(|| {
                        prev_rank
                            .get(a.source.community.as_str())
                            .cmp(&prev_rank.get(b.source.community.as_str()))
                    })
                    .then_with(|| {
                        rank.get(a.target.community.as_str())
                            .cmp(&rank.get(b.target.community.as_str()))
                    })
            });

            let mut continued: HashSet<u32> = HashSet::new();
            for link in links {
                let Some(&id) = assignment.get(&link.source) else {
                    continue;
                };
                let target = link.target.community.as_str();
                if continued.contains(&id) || inherited.contains_key(target) {
                    continue;
                }
                continued.insert(id);
                inherited.insert(target, id);
            }
        }

        for community in &slice.communities {
            let id = match inherited.get(community.id.as_str()) {
                Some(&id) => id,
                None => {
                    let id = next_id;
                    next_id += 1;
                    id
                }
            };
            assignment.insert(
                CommunityKey::new(slice.time.clone(), community.id.clone()),
                id,
            );
        }
    }

    assignment
}

/// Build timelines, stability and colour for every dynamic identity
pub fn assemble_dynamic_communities(
    index: &SliceIndex,
    matches: &[Vec<CommunityMatch>],
    policy: IdentityPolicy,
    track_threshold: f64,
) -> DynamicAssembly {
    let assignment = match policy {
        IdentityPolicy::RawLabel => assign_by_raw_label(index),
        IdentityPolicy::TrackedChain => assign_by_tracked_chain(index, matches, track_threshold),
    };

    // id -> (slice position, community id)
    let mut occurrences: BTreeMap<u32, Vec<(usize, &str)>> = BTreeMap::new();
    for (position, slice) in index.slices.iter().enumerate() {
        for community in &slice.communities {
            let key = CommunityKey::new(slice.time.clone(), community.id.clone());
            if let Some(&id) = assignment.get(&key) {
                occurrences
                    .entry(id)
                    .or_default()
                    .push((position, community.id.as_str()));
            }
        }
    }

    let range = IdRange::from_ids(occurrences.keys().copied());

    let communities: Vec<DynamicCommunity> = occurrences
        .into_iter()
        .map(|(id, seen)| {
            let first = seen.first().map(|s| s.0).unwrap_or(0);
            let last = seen.last().map(|s| s.0).unwrap_or(0);
            let by_position: HashMap<usize, &str> = seen.into_iter().collect();

            let timeline: Vec<TimelineEntry> = (first..=last)
                .map(|position| TimelineEntry {
                    time: index.slices[position].time.clone(),
                    community_id: by_position.get(&position).map(|c| c.to_string()),
                })
                .collect();

            DynamicCommunity {
                id,
                stability: dynamic_stability(index, &timeline),
                color: dynamic_community_color(id, range),
                timeline,
            }
        })
        .collect();

    log::info!(
        "Assembled {} dynamic communities ({:?})",
        communities.len(),
        policy
    );

    DynamicAssembly {
        assignment,
        communities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tracker::track_slices;
    use crate::data::{CommunityRecord, NodeRecord, TemporalGraph, TimeSlice};

    /// Slice 2 renumbers every community; slice 3 loses one of them.
    fn renumbered() -> TemporalGraph {
        let mut nodes = Vec::new();
        for (time, cluster, members) in [
            ("1", "C1", vec!["a", "b", "c", "d"]),
            ("1", "C2", vec!["e", "f", "g"]),
            ("2", "C7", vec!["e", "f", "g"]),
            ("2", "C8", vec!["a", "b", "c"]),
            ("3", "C1", vec!["a", "b", "c", "x"]),
            ("3", "C2", vec!["y", "z"]),
        ] {
            for node in members {
                nodes.push(NodeRecord::new(node, time, cluster));
            }
        }
        let communities = [
            ("1", "C1"),
            ("1", "C2"),
            ("2", "C7"),
            ("2", "C8"),
            ("3", "C1"),
            ("3", "C2"),
        ]
        .into_iter()
        .map(|(t, c)| CommunityRecord::new(t, c))
        .collect();
        TemporalGraph::new(nodes, Vec::new(), communities)
    }

    fn key(time: &str, id: &str) -> CommunityKey {
        CommunityKey::new(TimeSlice::from(time), id)
    }

    #[test]
    fn raw_label_reuses_ids_by_name() {
        let index = SliceIndex::build(&renumbered());
        let assignment = assign_by_raw_label(&index);
        assert_eq!(assignment[&key("1", "C1")], 1);
        assert_eq!(assignment[&key("3", "C1")], 1);
        assert_eq!(assignment[&key("2", "C7")], 3);

        let assembly =
            assemble_dynamic_communities(&index, &[], IdentityPolicy::RawLabel, 0.4);
        let first = &assembly.communities[0];
        assert_eq!(first.timeline.len(), 3);
        assert_eq!(first.timeline[1].community_id, None);
    }

    #[test]
    fn tracked_chain_follows_renumbering() {
        let index = SliceIndex::build(&renumbered());
        let matches = track_slices(&index, 0.1);
        let assignment = assign_by_tracked_chain(&index, &matches, 0.4);

        assert_eq!(assignment[&key("1", "C1")], 1);
        assert_eq!(assignment[&key("2", "C8")], 1);
        assert_eq!(assignment[&key("3", "C1")], 1);
        assert_eq!(assignment[&key("2", "C7")], 2);
        // C7 has no successor; the new C2 opens a fresh identity
        assert_eq!(assignment[&key("3", "C2")], 3);
    }

    #[test]
    fn an_identity_continues_into_one_community_only() {
        let mut nodes = Vec::new();
        for (time, cluster, members) in [
            ("1", "A", vec!["a", "b", "c", "d", "e", "f"]),
            ("2", "B", vec!["a", "b", "c"]),
            ("2", "C", vec!["d", "e", "f"]),
        ] {
            for node in members {
                nodes.push(NodeRecord::new(node, time, cluster));
            }
        }
        let graph = TemporalGraph::new(
            nodes,
            Vec::new(),
            vec![
                CommunityRecord::new("1", "A"),
                CommunityRecord::new("2", "B"),
                CommunityRecord::new("2", "C"),
            ],
        );
        let index = SliceIndex::build(&graph);
        let matches = track_slices(&index, 0.1);
        let assembly =
            assemble_dynamic_communities(&index, &matches, IdentityPolicy::TrackedChain, 0.4);

        // equal similarity: roster order breaks the tie
        assert_eq!(assembly.assignment[&key("2", "B")], 1);
        assert_eq!(assembly.assignment[&key("2", "C")], 2);
        assert_eq!(assembly.communities.len(), 2);
        assert_eq!(assembly.communities[0].stability, 0.5);
        assert_eq!(assembly.communities[1].timeline.len(), 1);
    }

    #[test]
    fn extinct_community_has_no_later_entries() {
        let index = SliceIndex::build(&renumbered());
        let matches = track_slices(&index, 0.1);
        let assembly =
            assemble_dynamic_communities(&index, &matches, IdentityPolicy::TrackedChain, 0.4);
        let chain = assembly.communities.iter().find(|d| d.id == 2).unwrap();
        let times: Vec<&str> = chain.timeline.iter().map(|e| e.time.as_str()).collect();
        assert_eq!(times, vec!["1", "2"]);
        assert_eq!(chain.stability, 1.0);
        assert!(chain.color.starts_with('#'));
    }
}
