//! End-to-end assembly of a flow diagram from the raw record streams

use serde::{Deserialize, Serialize};

use crate::cluster::dynamic::assemble_dynamic_communities;
use crate::cluster::metrics::{calculate_community_metrics, calculate_vertex_stabilities, NEUTRAL};
use crate::cluster::tracker::{reposition_curves, track_slices, transition_curves, CommunityMatch};
use crate::cluster::{CommunityBlock, DynamicCommunity, TransitionCurve, VertexStability};
use crate::config::Config;
use crate::data::{CommunityKey, SliceIndex, TemporalGraph, TimeSlice};
use crate::layout::{
    apply_ordering, current_order, OptimizerControl, OrderingOptimizer, SliceOrdering,
};

/// How the final community order was obtained
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub crossings: usize,
    pub stability_cost: usize,
    pub score: f64,
    pub initial_score: f64,
    pub restarts_completed: usize,
    pub best_restart: Option<usize>,

    /// Set when optimization failed and the initial order was kept.
    /// The statistics above are zero in that case.
    pub fallback: Option<String>,
}

/// Everything a renderer needs to draw the diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDiagram {
    pub timestamps: Vec<TimeSlice>,
    pub blocks: Vec<CommunityBlock>,
    pub curves: Vec<TransitionCurve>,
    pub dynamic_communities: Vec<DynamicCommunity>,
    pub vertex_stabilities: Vec<VertexStability>,
    pub layout: LayoutReport,
}

pub fn build_flow_diagram(graph: &TemporalGraph, config: &Config) -> FlowDiagram {
    build_flow_diagram_with(graph, config, &OptimizerControl::default())
}

/// Build the diagram, letting the caller cancel or bound the ordering
/// search. Never fails: an ordering error degrades to the roster order.
pub fn build_flow_diagram_with(
    graph: &TemporalGraph,
    config: &Config,
    control: &OptimizerControl,
) -> FlowDiagram {
    let index = SliceIndex::build(graph);
    log::info!(
        "Indexed {} slices with {} communities",
        index.slices.len(),
        index.slices.iter().map(|s| s.communities.len()).sum::<usize>()
    );

    let matches = track_slices(&index, config.match_threshold);
    let metrics = calculate_community_metrics(&index);
    let vertex_stabilities = calculate_vertex_stabilities(&index);
    let assembly = assemble_dynamic_communities(
        &index,
        &matches,
        config.identity_policy,
        config.track_threshold,
    );

    let mut blocks: Vec<CommunityBlock> = Vec::new();
    for slice in &index.slices {
        for community in &slice.communities {
            let key = CommunityKey::new(slice.time.clone(), community.id.clone());
            let (density, stability) = metrics
                .get(&key)
                .map(|m| (m.density, m.stability))
                .unwrap_or((NEUTRAL, NEUTRAL));
            blocks.push(CommunityBlock {
                time: slice.time.clone(),
                community_id: community.id.clone(),
                y0: 0.0,
                y1: 0.0,
                node_ids: community.members.iter().cloned().collect(),
                density,
                stability,
                label: community.label.clone(),
                dynamic_community_id: assembly.assignment.get(&key).copied(),
            });
        }
    }

    let roster_order: Vec<SliceOrdering> = index
        .slices
        .iter()
        .map(|slice| SliceOrdering {
            time: slice.time.clone(),
            communities: slice.communities.iter().map(|c| c.id.clone()).collect(),
        })
        .collect();
    let initial_blocks = apply_ordering(&blocks, &roster_order, config.interval_mode);

    let all_matches: Vec<CommunityMatch> = matches.into_iter().flatten().collect();
    let curves = transition_curves(&all_matches, &initial_blocks);

    let timestamps = index.timestamps();
    let (order, layout) =
        layout_or_fallback(&timestamps, &initial_blocks, &curves, config, control);
    let blocks = apply_ordering(&initial_blocks, &order, config.interval_mode);
    let curves = reposition_curves(&curves, &blocks);

    log::info!(
        "Flow diagram ready: {} blocks, {} curves, {} dynamic communities",
        blocks.len(),
        curves.len(),
        assembly.communities.len()
    );

    FlowDiagram {
        timestamps,
        blocks,
        curves,
        dynamic_communities: assembly.communities,
        vertex_stabilities,
        layout,
    }
}

/// Run the ordering search over `blocks` laid on `timeline`, falling back
/// to their current order if the search fails
pub fn layout_or_fallback(
    timeline: &[TimeSlice],
    blocks: &[CommunityBlock],
    curves: &[TransitionCurve],
    config: &Config,
    control: &OptimizerControl,
) -> (Vec<SliceOrdering>, LayoutReport) {
    let outcome = OrderingOptimizer::new(timeline, blocks, curves, config)
        .and_then(|optimizer| optimizer.optimize(control));

    match outcome {
        Ok(result) => {
            let report = LayoutReport {
                crossings: result.crossings,
                stability_cost: result.stability_cost,
                score: result.score,
                initial_score: result.initial_score,
                restarts_completed: result.restarts_completed,
                best_restart: result.best_restart,
                fallback: None,
            };
            (result.order, report)
        }
        Err(e) => {
            let warning = format!("ordering failed, keeping initial order: {e}");
            log::warn!("{}", warning);
            let report = LayoutReport {
                fallback: Some(warning),
                ..Default::default()
            };
            (current_order(blocks), report)
        }
    }
}
