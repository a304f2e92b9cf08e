//! Per-slice indexing of the raw record streams

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{CommunityId, CommunityKey, NodeId, TemporalGraph, TimeSlice};

/// A non-empty community as seen at one slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceCommunity {
    pub id: CommunityId,
    pub label: String,
    pub members: BTreeSet<NodeId>,
}

impl SliceCommunity {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Everything the core needs to know about one time slice
#[derive(Debug, Clone, Default)]
pub struct Slice {
    pub time: TimeSlice,

    /// Non-empty roster communities, in declared order
    pub communities: Vec<SliceCommunity>,

    /// Cluster label of every node recorded at this slice
    pub assignments: HashMap<NodeId, CommunityId>,

    /// Deduplicated undirected edges between nodes present at this slice
    pub edges: Vec<(NodeId, NodeId)>,

    /// Edges skipped because an endpoint is absent from this slice
    pub dangling_edges: usize,

    /// Raw community id to its index in `communities`
    by_id: HashMap<CommunityId, usize>,
}

impl Slice {
    pub fn new(time: TimeSlice) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }

    /// Append a community to the roster, keeping the id lookup in step
    pub fn push_community(&mut self, community: SliceCommunity) {
        self.by_id.insert(community.id.clone(), self.communities.len());
        self.communities.push(community);
    }

    pub fn community(&self, id: &str) -> Option<&SliceCommunity> {
        self.by_id.get(id).map(|&i| &self.communities[i])
    }

    pub fn members(&self, id: &str) -> Option<&BTreeSet<NodeId>> {
        self.community(id).map(|c| &c.members)
    }
}

/// All slices in global time order
#[derive(Debug, Clone, Default)]
pub struct SliceIndex {
    pub slices: Vec<Slice>,
}

impl SliceIndex {
    /// Join the three record streams into per-slice communities
    pub fn build(graph: &TemporalGraph) -> Self {
        let timestamps = graph.timestamps();
        let position: HashMap<&TimeSlice, usize> =
            timestamps.iter().enumerate().map(|(i, t)| (t, i)).collect();

        let mut slices: Vec<Slice> = timestamps.iter().cloned().map(Slice::new).collect();

        // Node assignments; first record wins when a node is listed twice
        let mut members_by_slice: Vec<BTreeMap<&str, BTreeSet<NodeId>>> =
            vec![BTreeMap::new(); timestamps.len()];
        for record in &graph.nodes {
            let idx = position[&record.time];
            let slice = &mut slices[idx];
            if slice.assignments.contains_key(&record.node_id) {
                log::debug!(
                    "node {} listed more than once at {}; keeping first cluster",
                    record.node_id,
                    record.time
                );
                continue;
            }
            slice
                .assignments
                .insert(record.node_id.clone(), record.cluster.clone());
            members_by_slice[idx]
                .entry(record.cluster.as_str())
                .or_default()
                .insert(record.node_id.clone());
        }

        // Rosters in declared order, dropping empty communities
        let mut seen_roster: HashSet<(&TimeSlice, &str)> = HashSet::new();
        for record in &graph.communities {
            if !seen_roster.insert((&record.time, record.community_id.as_str())) {
                continue;
            }
            let idx = position[&record.time];
            let members = members_by_slice[idx]
                .remove(record.community_id.as_str())
                .unwrap_or_default();

            if members.is_empty() {
                log::debug!(
                    "community {} at {} has no members; excluded",
                    record.community_id,
                    record.time
                );
                continue;
            }
            if let Some(size) = record.size {
                if size != members.len() {
                    log::debug!(
                        "community {} at {} declares size {} but has {} members",
                        record.community_id,
                        record.time,
                        size,
                        members.len()
                    );
                }
            }

            slices[idx].push_community(SliceCommunity {
                id: record.community_id.clone(),
                label: record.label.clone(),
                members,
            });
        }

        for (idx, leftovers) in members_by_slice.iter().enumerate() {
            if !leftovers.is_empty() {
                log::debug!(
                    "{} cluster labels at {} are not on the roster; their nodes are ignored for membership",
                    leftovers.len(),
                    timestamps[idx]
                );
            }
        }

        // Edges, undirected and deduplicated
        let mut seen_edges: Vec<HashSet<(&str, &str)>> = vec![HashSet::new(); timestamps.len()];
        for edge in &graph.edges {
            let idx = position[&edge.time];
            let slice = &mut slices[idx];
            if edge.src == edge.dst {
                continue;
            }
            if !slice.assignments.contains_key(&edge.src)
                || !slice.assignments.contains_key(&edge.dst)
            {
                slice.dangling_edges += 1;
                continue;
            }
            let pair = if edge.src < edge.dst {
                (edge.src.as_str(), edge.dst.as_str())
            } else {
                (edge.dst.as_str(), edge.src.as_str())
            };
            if seen_edges[idx].insert(pair) {
                slice.edges.push((pair.0.to_string(), pair.1.to_string()));
            }
        }

        for slice in &slices {
            if slice.dangling_edges > 0 {
                log::debug!(
                    "skipped {} edges at {} referencing absent nodes",
                    slice.dangling_edges,
                    slice.time
                );
            }
        }

        Self { slices }
    }

    pub fn timestamps(&self) -> Vec<TimeSlice> {
        self.slices.iter().map(|s| s.time.clone()).collect()
    }

    pub fn position(&self, time: &TimeSlice) -> Option<usize> {
        self.slices.binary_search_by(|s| s.time.cmp(time)).ok()
    }

    pub fn members(&self, key: &CommunityKey) -> Option<&BTreeSet<NodeId>> {
        let idx = self.position(&key.time)?;
        self.slices[idx].members(&key.community)
    }

    /// Each node's cluster label at every slice it appears in, time-ordered
    pub fn node_timelines(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut timelines: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for slice in &self.slices {
            for (node, cluster) in &slice.assignments {
                timelines.entry(node.as_str()).or_default().push(cluster.as_str());
            }
        }
        timelines
    }
}
