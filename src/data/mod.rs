//! Input model: per-slice node memberships, edges and community rosters

pub mod loader;
pub mod slices;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use slices::{Slice, SliceCommunity, SliceIndex};

/// Identifier of a vertex, stable across time slices
pub type NodeId = String;

/// Identifier of a community within one time slice
pub type CommunityId = String;

/// An opaque timestamp token.
///
/// Integer tokens sort before all other tokens. Among themselves they
/// compare numerically, falling back to the text for equal values such as
/// `"01"` and `"1"`. The remaining tokens compare lexically, so
/// `"2" < "10" < "1a"` and ISO-8601 dates sort by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSlice(String);

impl TimeSlice {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for TimeSlice {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<i64>(), other.0.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for TimeSlice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimeSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimeSlice {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Arena key for a community occurrence: blocks and curves refer to each
/// other only through these keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommunityKey {
    pub time: TimeSlice,
    pub community: CommunityId,
}

impl CommunityKey {
    pub fn new(time: TimeSlice, community: impl Into<CommunityId>) -> Self {
        Self {
            time,
            community: community.into(),
        }
    }
}

impl fmt::Display for CommunityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.community, self.time)
    }
}

/// Presentation attributes carried alongside a membership record.
/// The core never reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub label: Option<String>,
}

/// A node's community membership at one time slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub time: TimeSlice,
    pub cluster: CommunityId,
    #[serde(default)]
    pub attributes: NodeAttributes,
}

impl NodeRecord {
    pub fn new(
        node_id: impl Into<NodeId>,
        time: impl Into<TimeSlice>,
        cluster: impl Into<CommunityId>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            time: time.into(),
            cluster: cluster.into(),
            attributes: NodeAttributes::default(),
        }
    }
}

/// An undirected edge observed at one time slice; only used for density
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub src: NodeId,
    pub dst: NodeId,
    pub time: TimeSlice,
}

impl EdgeRecord {
    pub fn new(
        src: impl Into<NodeId>,
        dst: impl Into<NodeId>,
        time: impl Into<TimeSlice>,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            time: time.into(),
        }
    }
}

/// Declared community roster entry for one slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub time: TimeSlice,
    pub community_id: CommunityId,
    pub size: Option<usize>,
    pub label: String,
}

impl CommunityRecord {
    pub fn new(time: impl Into<TimeSlice>, community_id: impl Into<CommunityId>) -> Self {
        let community_id = community_id.into();
        Self {
            time: time.into(),
            label: community_id.clone(),
            community_id,
            size: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// The three immutable record streams supplied by an external loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalGraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub communities: Vec<CommunityRecord>,
}

impl TemporalGraph {
    pub fn new(
        nodes: Vec<NodeRecord>,
        edges: Vec<EdgeRecord>,
        communities: Vec<CommunityRecord>,
    ) -> Self {
        Self {
            nodes,
            edges,
            communities,
        }
    }

    /// Sorted distinct time slices across all three streams
    pub fn timestamps(&self) -> Vec<TimeSlice> {
        let mut times: Vec<TimeSlice> = self
            .nodes
            .iter()
            .map(|n| &n.time)
            .chain(self.edges.iter().map(|e| &e.time))
            .chain(self.communities.iter().map(|c| &c.time))
            .cloned()
            .collect();
        times.sort();
        times.dedup();
        times
    }
}
