//! Ordering communities within their slices and turning ranks into
//! vertical intervals

pub mod objective;
pub mod optimizer;
pub mod problem;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cluster::CommunityBlock;
use crate::config::IntervalMode;
use crate::data::{CommunityId, CommunityKey, TimeSlice};

pub use optimizer::{CancelToken, OptimizerControl, OrderingOptimizer};
pub use problem::OrderingProblem;

/// Top-to-bottom order of one slice's communities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceOrdering {
    pub time: TimeSlice,
    pub communities: Vec<CommunityId>,
}

/// Outcome of an ordering search
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingResult {
    pub order: Vec<SliceOrdering>,
    pub crossings: usize,
    pub stability_cost: usize,
    pub score: f64,

    /// Score of the order the optimizer was given
    pub initial_score: f64,

    pub restarts_completed: usize,

    /// Restart that produced `order`; `None` if no restart ran
    pub best_restart: Option<usize>,
}

/// Current order of `blocks`: slices in time order, communities by `y0`
/// with ties kept in input order
pub fn current_order(blocks: &[CommunityBlock]) -> Vec<SliceOrdering> {
    let mut by_time: Vec<(TimeSlice, Vec<&CommunityBlock>)> = Vec::new();
    let mut slot: HashMap<&TimeSlice, usize> = HashMap::new();

    for block in blocks {
        let idx = *slot.entry(&block.time).or_insert_with(|| {
            by_time.push((block.time.clone(), Vec::new()));
            by_time.len() - 1
        });
        by_time[idx].1.push(block);
    }

    by_time.sort_by(|a, b| a.0.cmp(&b.0));
    by_time
        .into_iter()
        .map(|(time, mut members)| {
            members.sort_by(|a, b| a.y0.total_cmp(&b.y0));
            SliceOrdering {
                time,
                communities: members.iter().map(|b| b.community_id.clone()).collect(),
            }
        })
        .collect()
}

/// Assign contiguous `[y0, y1)` intervals partitioning `[0, 1]` to each
/// slice's communities in the given order.
///
/// Returned blocks are grouped by slice and sorted by rank. Blocks the
/// order does not mention are passed through untouched at the end.
pub fn apply_ordering(
    blocks: &[CommunityBlock],
    order: &[SliceOrdering],
    mode: IntervalMode,
) -> Vec<CommunityBlock> {
    let lookup: HashMap<CommunityKey, &CommunityBlock> =
        blocks.iter().map(|b| (b.key(), b)).collect();
    let mut placed: HashSet<CommunityKey> = HashSet::with_capacity(blocks.len());
    let mut result = Vec::with_capacity(blocks.len());

    for slice in order {
        let members: Vec<&CommunityBlock> = slice
            .communities
            .iter()
            .filter_map(|c| lookup.get(&CommunityKey::new(slice.time.clone(), c.clone())).copied())
            .collect();
        if members.is_empty() {
            continue;
        }

        let heights: Vec<f64> = match mode {
            IntervalMode::Equal => vec![1.0; members.len()],
            IntervalMode::BySize => members.iter().map(|b| b.size().max(1) as f64).collect(),
        };
        let total: f64 = heights.iter().sum();

        let mut cumulative = 0.0;
        let last = members.len() - 1;
        for (rank, (block, height)) in members.into_iter().zip(heights).enumerate() {
            let mut positioned = block.clone();
            positioned.y0 = cumulative / total;
            cumulative += height;
            positioned.y1 = if rank == last { 1.0 } else { cumulative / total };
            placed.insert(positioned.key());
            result.push(positioned);
        }
    }

    for block in blocks {
        if !placed.contains(&block.key()) {
            result.push(block.clone());
        }
    }

    result
}
