//! Community tracking, metrics and dynamic identities

pub mod dynamic;
pub mod metrics;
pub mod tracker;

use serde::{Deserialize, Serialize};

use crate::data::{CommunityId, CommunityKey, NodeId, TimeSlice};

/// A community drawn as a vertical block of its slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityBlock {
    pub time: TimeSlice,
    pub community_id: CommunityId,

    /// Top of the block's interval within `[0, 1]`
    pub y0: f64,

    /// Bottom of the block's interval, exclusive
    pub y1: f64,

    /// Members, sorted
    pub node_ids: Vec<NodeId>,

    /// Internal edges over possible undirected pairs
    pub density: f64,

    /// Self-continuity of the raw label with neighbouring slices
    pub stability: f64,

    pub label: String,

    /// Persistent identity assigned by the dynamic-community assembler
    pub dynamic_community_id: Option<u32>,
}

impl CommunityBlock {
    pub fn key(&self) -> CommunityKey {
        CommunityKey::new(self.time.clone(), self.community_id.clone())
    }

    pub fn size(&self) -> usize {
        self.node_ids.len()
    }

    pub fn center(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }
}

/// One end of a transition curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveEndpoint {
    pub time: TimeSlice,
    pub y: f64,
    pub community_id: CommunityId,
}

impl CurveEndpoint {
    pub fn key(&self) -> CommunityKey {
        CommunityKey::new(self.time.clone(), self.community_id.clone())
    }
}

/// A ribbon between matched communities of adjacent slices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionCurve {
    pub source: CurveEndpoint,
    pub target: CurveEndpoint,

    /// Nodes shared by both endpoints, sorted
    pub node_ids: Vec<NodeId>,

    /// Shared-node flow, normalized across a split
    pub weight: f64,

    /// Draw-order hint
    pub rank: f64,

    /// Derived from the two endpoint ids; not a cross-timeline identity
    pub dynamic_community_id: String,
}

/// A chain of community occurrences sharing one identity over time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCommunity {
    pub id: u32,

    /// One entry per slice from first to last appearance; `None` marks a gap
    pub timeline: Vec<TimelineEntry>,

    pub stability: f64,

    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time: TimeSlice,
    pub community_id: Option<CommunityId>,
}

impl DynamicCommunity {
    /// Community occurrences, skipping gaps
    pub fn occurrences(&self) -> impl Iterator<Item = CommunityKey> + '_ {
        self.timeline.iter().filter_map(|entry| {
            entry
                .community_id
                .as_ref()
                .map(|c| CommunityKey::new(entry.time.clone(), c.clone()))
        })
    }
}

/// How consistently a vertex keeps its cluster label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexStability {
    pub node_id: NodeId,
    pub stability: f64,
}
