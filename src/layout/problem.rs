//! Index-based view of blocks and curves used by the ordering search

use std::collections::HashMap;

use crate::cluster::{CommunityBlock, TransitionCurve};
use crate::data::{CommunityId, TimeSlice};
use crate::error::OrderingError;
use crate::layout::{current_order, SliceOrdering};

/// Slice-local community indices, one list per slice, top to bottom
pub type Order = Vec<Vec<usize>>;

/// A curve between slice `i` and `i + 1`, by slice-local index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub source: usize,
    pub target: usize,

    /// Shared node count; pulls the endpoints towards each other
    pub weight: f64,
}

/// Immutable input shared by every restart
#[derive(Debug, Clone)]
pub struct OrderingProblem {
    pub slices: Vec<TimeSlice>,

    /// Community ids per slice; position is the slice-local index and
    /// matches the order the blocks arrived in. Empty for slices without
    /// blocks.
    pub communities: Vec<Vec<CommunityId>>,

    /// Member counts, same layout as `communities`
    pub sizes: Vec<Vec<usize>>,

    /// `links[i]` joins slice `i` to slice `i + 1`
    pub links: Vec<Vec<Link>>,

    /// `carried[i]` pairs `(index at i - 1, index at i)` for communities
    /// whose raw id appears in both slices; `carried[0]` is empty
    pub carried: Vec<Vec<(usize, usize)>>,
}

impl OrderingProblem {
    /// Index `blocks` and `curves` against the global slice `timeline`.
    ///
    /// Slices of the timeline without blocks get an empty order, so only
    /// globally adjacent slices are linked or compared for displacement.
    pub fn new(
        timeline: &[TimeSlice],
        blocks: &[CommunityBlock],
        curves: &[TransitionCurve],
    ) -> Result<Self, OrderingError> {
        let position: HashMap<&TimeSlice, usize> =
            timeline.iter().enumerate().map(|(i, t)| (t, i)).collect();

        let mut communities: Vec<Vec<CommunityId>> = vec![Vec::new(); timeline.len()];
        for SliceOrdering {
            time,
            communities: ids,
        } in current_order(blocks)
        {
            let slice = *position
                .get(&time)
                .ok_or_else(|| OrderingError::UnknownSlice(time.to_string()))?;
            communities[slice] = ids;
        }

        let mut local: Vec<HashMap<&str, usize>> = Vec::with_capacity(timeline.len());
        for (time, ids) in timeline.iter().zip(&communities) {
            let mut index: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
            for (i, id) in ids.iter().enumerate() {
                if index.insert(id.as_str(), i).is_some() {
                    return Err(OrderingError::DuplicateBlock {
                        time: time.to_string(),
                        community: id.clone(),
                    });
                }
            }
            local.push(index);
        }

        let size_of: HashMap<(&TimeSlice, &str), usize> = blocks
            .iter()
            .map(|b| ((&b.time, b.community_id.as_str()), b.size()))
            .collect();
        let sizes: Vec<Vec<usize>> = timeline
            .iter()
            .zip(&communities)
            .map(|(time, ids)| ids.iter().map(|id| size_of[&(time, id.as_str())]).collect())
            .collect();

        let mut links: Vec<Vec<Link>> = vec![Vec::new(); timeline.len().saturating_sub(1)];
        for curve in curves {
            let (source_slice, source) =
                locate(&position, &local, &curve.source.time, &curve.source.community_id)?;
            let (target_slice, target) =
                locate(&position, &local, &curve.target.time, &curve.target.community_id)?;
            if target_slice != source_slice + 1 {
                return Err(OrderingError::NonAdjacentCurve {
                    source_time: curve.source.time.to_string(),
                    target_time: curve.target.time.to_string(),
                });
            }

            links[source_slice].push(Link {
                source,
                target,
                weight: curve.node_ids.len() as f64,
            });
        }

        let mut carried = vec![Vec::new(); timeline.len()];
        for i in 1..timeline.len() {
            carried[i] = communities[i]
                .iter()
                .enumerate()
                .filter_map(|(cur, id)| local[i - 1].get(id.as_str()).map(|&prev| (prev, cur)))
                .collect();
        }

        Ok(Self {
            slices: timeline.to_vec(),
            communities,
            sizes,
            links,
            carried,
        })
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Communities in the order they were handed in
    pub fn input_order(&self) -> Order {
        self.communities.iter().map(|ids| (0..ids.len()).collect()).collect()
    }

    /// Translate a local-index order back into community ids
    pub fn to_slice_orderings(&self, order: &Order) -> Vec<SliceOrdering> {
        self.slices
            .iter()
            .zip(order)
            .enumerate()
            .map(|(s, (time, ranks))| SliceOrdering {
                time: time.clone(),
                communities: ranks.iter().map(|&i| self.communities[s][i].clone()).collect(),
            })
            .collect()
    }
}

/// Slice position and slice-local index of a curve endpoint
fn locate(
    position: &HashMap<&TimeSlice, usize>,
    local: &[HashMap<&str, usize>],
    time: &TimeSlice,
    community: &str,
) -> Result<(usize, usize), OrderingError> {
    let unknown = || OrderingError::UnknownEndpoint {
        time: time.to_string(),
        community: community.to_string(),
    };
    let slice = *position.get(time).ok_or_else(unknown)?;
    let idx = *local[slice].get(community).ok_or_else(unknown)?;
    Ok((slice, idx))
}

/// `ranks[c]` = position of local community `c` within `slice_order`
pub fn ranks(slice_order: &[usize]) -> Vec<usize> {
    let mut ranks = vec![0; slice_order.len()];
    for (rank, &c) in slice_order.iter().enumerate() {
        ranks[c] = rank;
    }
    ranks
}
