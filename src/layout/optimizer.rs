//! Crossing reduction by alternating barycenter sweeps over several
//! independent starting orders

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::cluster::{CommunityBlock, TransitionCurve};
use crate::config::Config;
use crate::data::TimeSlice;
use crate::error::OrderingError;
use crate::layout::objective::{crossings, score, stability_cost};
use crate::layout::problem::{ranks, Order, OrderingProblem};
use crate::layout::OrderingResult;

/// Cooperative cancellation flag shared with a running optimization
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Caller-side controls, checked before each restart and between sweeps
#[derive(Debug, Clone, Default)]
pub struct OptimizerControl {
    pub cancel: CancelToken,

    /// Past this instant no new restart starts and running ones stop after
    /// their current sweep
    pub deadline: Option<Instant>,
}

impl OptimizerControl {
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Default::default()
        }
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Starting-order policy, chosen by restart index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitialPolicy {
    Identity,
    Reversed,
    SizeDescending,
    Shuffled,
}

impl InitialPolicy {
    fn for_restart(restart: usize) -> Self {
        match restart % 4 {
            0 => Self::Identity,
            1 => Self::Reversed,
            2 => Self::SizeDescending,
            _ => Self::Shuffled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    LeftToRight,
    RightToLeft,
}

/// Best order found by one restart
#[derive(Debug, Clone)]
struct Candidate {
    restart: usize,
    order: Order,
    score: f64,
}

/// Searches for per-slice community orders minimizing
/// `crossings + lambda * stability_cost`
pub struct OrderingOptimizer {
    problem: OrderingProblem,
    stability_weight: f64,
    restarts: usize,
    sweeps_max: usize,
    early_stop_threshold: usize,
    seed: u64,
}

impl OrderingOptimizer {
    /// Index the blocks and curves against `timeline`. Blocks are taken in
    /// their current top-to-bottom order, which is also the identity
    /// starting order.
    pub fn new(
        timeline: &[TimeSlice],
        blocks: &[CommunityBlock],
        curves: &[TransitionCurve],
        config: &Config,
    ) -> Result<Self, OrderingError> {
        Ok(Self {
            problem: OrderingProblem::new(timeline, blocks, curves)?,
            stability_weight: config.stability_weight,
            restarts: config.restarts.max(1),
            sweeps_max: config.sweeps_max,
            early_stop_threshold: config.early_stop_threshold.max(1),
            seed: config.seed,
        })
    }

    pub fn problem(&self) -> &OrderingProblem {
        &self.problem
    }

    /// Run every restart in parallel and keep the lowest score; ties go to
    /// the lowest restart index. If no restart gets to run, the input
    /// order is returned.
    pub fn optimize(&self, control: &OptimizerControl) -> Result<OrderingResult, OrderingError> {
        let input = self.problem.input_order();
        let initial_score = self.evaluate(&input)?;

        log::info!(
            "Optimizing community order over {} slices ({} restarts, initial score {:.4})",
            self.problem.slice_count(),
            self.restarts,
            initial_score
        );

        let candidates: Vec<Candidate> = (0..self.restarts)
            .into_par_iter()
            .map(|restart| {
                if control.should_stop() {
                    return Ok(None);
                }
                self.run_restart(restart, control).map(Some)
            })
            .collect::<Result<Vec<Option<Candidate>>, OrderingError>>()?
            .into_iter()
            .flatten()
            .collect();

        let restarts_completed = candidates.len();
        if restarts_completed < self.restarts {
            log::warn!(
                "Stopped early: {} of {} restarts ran",
                restarts_completed,
                self.restarts
            );
        }

        let best = select_best(candidates);
        let (order, best_restart, best_score) = match best {
            Some(c) => (c.order, Some(c.restart), c.score),
            None => (input, None, initial_score),
        };

        let result = OrderingResult {
            crossings: crossings(&self.problem, &order),
            stability_cost: stability_cost(&self.problem, &order),
            score: best_score,
            initial_score,
            restarts_completed,
            best_restart,
            order: self.problem.to_slice_orderings(&order),
        };

        log::info!(
            "Ordering done: {} crossings, stability cost {}, score {:.4}",
            result.crossings,
            result.stability_cost,
            result.score
        );

        Ok(result)
    }

    fn evaluate(&self, order: &Order) -> Result<f64, OrderingError> {
        let value = score(&self.problem, order, self.stability_weight);
        if !value.is_finite() {
            return Err(OrderingError::NonFiniteScore);
        }
        Ok(value)
    }

    /// Starting order for a restart
    fn initial_order(&self, restart: usize) -> Order {
        let mut order = self.problem.input_order();
        match InitialPolicy::for_restart(restart) {
            InitialPolicy::Identity => {}
            InitialPolicy::Reversed => order.iter_mut().for_each(|slice| slice.reverse()),
            InitialPolicy::SizeDescending => {
                for (s, slice) in order.iter_mut().enumerate() {
                    let sizes = &self.problem.sizes[s];
                    slice.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));
                }
            }
            InitialPolicy::Shuffled => {
                let mut rng = StdRng::seed_from_u64(self.seed ^ restart as u64);
                order.iter_mut().for_each(|slice| slice.shuffle(&mut rng));
            }
        }
        order
    }

    /// Alternate sweep directions from one starting order, keeping the best
    /// order seen. Stops after `sweeps_max` sweeps or `early_stop_threshold`
    /// sweeps without improvement.
    fn run_restart(
        &self,
        restart: usize,
        control: &OptimizerControl,
    ) -> Result<Candidate, OrderingError> {
        let mut current = self.initial_order(restart);
        let mut best = current.clone();
        let mut best_score = self.evaluate(&current)?;
        let mut stale = 0;

        for sweep in 0..self.sweeps_max {
            if control.should_stop() {
                break;
            }

            let direction = if sweep % 2 == 0 {
                Sweep::LeftToRight
            } else {
                Sweep::RightToLeft
            };
            self.sweep(&mut current, direction);

            let current_score = self.evaluate(&current)?;
            if current_score < best_score {
                best_score = current_score;
                best = current.clone();
                stale = 0;
            } else {
                stale += 1;
            }

            if stale >= self.early_stop_threshold {
                break;
            }
        }

        log::debug!("restart {} finished with score {:.4}", restart, best_score);

        Ok(Candidate {
            restart,
            order: best,
            score: best_score,
        })
    }

    fn sweep(&self, order: &mut Order, direction: Sweep) {
        let n = self.problem.slice_count();
        match direction {
            Sweep::LeftToRight => {
                for s in 1..n {
                    self.reorder_slice(order, s, direction);
                }
            }
            Sweep::RightToLeft => {
                for s in (0..n.saturating_sub(1)).rev() {
                    self.reorder_slice(order, s, direction);
                }
            }
        }
    }

    /// Re-sort slice `s` by the weighted mean position of its linked
    /// communities in the neighbouring slice (left for a left-to-right
    /// sweep, right otherwise).
    ///
    /// Positions are normalized to `(rank + 0.5) / len` so neighbours of
    /// different sizes compare. A community without links to that
    /// neighbour keeps its own normalized position. Ties keep the current
    /// order.
    fn reorder_slice(&self, order: &mut Order, s: usize, direction: Sweep) {
        let (reference, links) = match direction {
            Sweep::LeftToRight => (s - 1, &self.problem.links[s - 1]),
            Sweep::RightToLeft => (s + 1, &self.problem.links[s]),
        };

        let reference_pos = normalized_positions(&order[reference]);
        let own_pos = normalized_positions(&order[s]);

        let mut weighted = vec![0.0; own_pos.len()];
        let mut weight = vec![0.0; own_pos.len()];
        for link in links {
            let (own, other) = match direction {
                Sweep::LeftToRight => (link.target, link.source),
                Sweep::RightToLeft => (link.source, link.target),
            };
            weighted[own] += link.weight * reference_pos[other];
            weight[own] += link.weight;
        }

        let barycenter: Vec<f64> = (0..own_pos.len())
            .map(|c| {
                if weight[c] > 0.0 {
                    weighted[c] / weight[c]
                } else {
                    own_pos[c]
                }
            })
            .collect();

        order[s].sort_by(|&a, &b| barycenter[a].total_cmp(&barycenter[b]));
    }
}

/// `(rank + 0.5) / len` for every local community of a slice
fn normalized_positions(slice_order: &[usize]) -> Vec<f64> {
    let len = slice_order.len() as f64;
    ranks(slice_order)
        .into_iter()
        .map(|r| (r as f64 + 0.5) / len)
        .collect()
}

/// Lowest score wins; on a tie, the lowest restart index
fn select_best(candidates: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(prev) => {
                if candidate.score < prev.score
                    || (candidate.score == prev.score && candidate.restart < prev.restart)
                {
                    candidate
                } else {
                    prev
                }
            }
        });
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{block, curve, timeline};
    use std::time::Duration;

    fn config(restarts: usize, sweeps_max: usize) -> Config {
        Config {
            restarts,
            sweeps_max,
            seed: 7,
            ..Config::default()
        }
    }

    fn build(
        blocks: &[CommunityBlock],
        curves: &[TransitionCurve],
        config: &Config,
    ) -> OrderingOptimizer {
        OrderingOptimizer::new(&timeline(blocks), blocks, curves, config).unwrap()
    }

    /// Three slices whose input order crosses every flow
    fn tangled() -> (Vec<CommunityBlock>, Vec<TransitionCurve>) {
        let blocks = vec![
            block("1", "A", 4, 0.0),
            block("1", "B", 4, 0.3),
            block("1", "C", 4, 0.6),
            block("2", "c", 4, 0.0),
            block("2", "b", 4, 0.3),
            block("2", "a", 4, 0.6),
            block("3", "x", 4, 0.0),
            block("3", "y", 4, 0.3),
            block("3", "z", 4, 0.6),
        ];
        let curves = vec![
            curve(("1", "A"), ("2", "a"), 4),
            curve(("1", "B"), ("2", "b"), 4),
            curve(("1", "C"), ("2", "c"), 4),
            curve(("2", "a"), ("3", "x"), 4),
            curve(("2", "b"), ("3", "y"), 4),
            curve(("2", "c"), ("3", "z"), 4),
        ];
        (blocks, curves)
    }

    #[test]
    fn untangles_reversed_slice() {
        let (blocks, curves) = tangled();
        let optimizer = build(&blocks, &curves, &config(4, 15));
        let result = optimizer.optimize(&OptimizerControl::default()).unwrap();

        assert_eq!(result.initial_score, 6.0);
        assert_eq!(result.crossings, 0);
        assert!(result.score <= result.initial_score);
        assert_eq!(result.restarts_completed, 4);
        assert_eq!(result.order.len(), 3);
    }

    #[test]
    fn more_restarts_never_score_worse() {
        let (blocks, curves) = tangled();
        let mut previous = f64::INFINITY;
        for restarts in 1..=6 {
            let optimizer = build(&blocks, &curves, &config(restarts, 15));
            let score = optimizer.optimize(&OptimizerControl::default()).unwrap().score;
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn more_sweeps_never_score_worse() {
        let (blocks, curves) = tangled();
        let mut previous = f64::INFINITY;
        for sweeps in 0..=6 {
            let optimizer = build(&blocks, &curves, &config(1, sweeps));
            let score = optimizer.optimize(&OptimizerControl::default()).unwrap().score;
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (blocks, curves) = tangled();
        let optimizer = build(&blocks, &curves, &config(8, 15));
        let first = optimizer.optimize(&OptimizerControl::default()).unwrap();
        let second = optimizer.optimize(&OptimizerControl::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(optimizer.initial_order(3), optimizer.initial_order(3));
    }

    #[test]
    fn initial_policies_cycle() {
        let blocks = vec![
            block("1", "S", 1, 0.0),
            block("1", "M", 2, 0.3),
            block("1", "L", 3, 0.6),
        ];
        let optimizer = build(&blocks, &[], &config(4, 15));
        assert_eq!(optimizer.initial_order(0), vec![vec![0, 1, 2]]);
        assert_eq!(optimizer.initial_order(1), vec![vec![2, 1, 0]]);
        assert_eq!(optimizer.initial_order(2), vec![vec![2, 1, 0]]);
        assert_eq!(optimizer.initial_order(4), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn cancelled_run_returns_input_order() {
        let (blocks, curves) = tangled();
        let optimizer = build(&blocks, &curves, &config(4, 15));
        let control = OptimizerControl::default();
        control.cancel.cancel();

        let result = optimizer.optimize(&control).unwrap();
        assert_eq!(result.restarts_completed, 0);
        assert_eq!(result.best_restart, None);
        assert_eq!(result.score, result.initial_score);
        assert_eq!(result.order[1].communities, vec!["c", "b", "a"]);
    }

    #[test]
    fn expired_deadline_launches_nothing() {
        let (blocks, curves) = tangled();
        let optimizer = build(&blocks, &curves, &config(4, 15));
        let past = Instant::now() - Duration::from_millis(1);
        let result = optimizer.optimize(&OptimizerControl::with_deadline(past)).unwrap();
        assert_eq!(result.restarts_completed, 0);
    }

    #[test]
    fn empty_middle_slice_costs_nothing() {
        let blocks = vec![
            block("1", "A", 2, 0.0),
            block("1", "B", 2, 0.5),
            block("3", "B", 2, 0.0),
            block("3", "A", 2, 0.5),
        ];
        let times = ["1", "2", "3"].map(TimeSlice::from);
        let optimizer = OrderingOptimizer::new(&times, &blocks, &[], &config(4, 15)).unwrap();
        let result = optimizer.optimize(&OptimizerControl::default()).unwrap();

        assert_eq!(result.initial_score, 0.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.order.len(), 3);
        assert!(result.order[1].communities.is_empty());
        assert_eq!(result.order[2].communities, vec!["B", "A"]);
    }

    #[test]
    fn tie_goes_to_lowest_restart() {
        let a = Candidate { restart: 2, order: vec![], score: 1.0 };
        let b = Candidate { restart: 0, order: vec![], score: 1.0 };
        let c = Candidate { restart: 1, order: vec![], score: 3.0 };
        assert_eq!(select_best(vec![a, b, c]).map(|c| c.restart), Some(0));
        assert!(select_best(Vec::new()).is_none());
    }
}
