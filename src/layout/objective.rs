//! Crossing count and positional churn of a candidate order

use itertools::Itertools;

use crate::layout::problem::{ranks, Order, OrderingProblem};

/// Number of curve pairs that cross, summed over adjacent slice pairs.
///
/// Two curves between the same slices cross when their source ranks and
/// target ranks are strictly inversely ordered. Curves sharing an endpoint
/// never cross. Each unordered pair is counted once.
pub fn crossings(problem: &OrderingProblem, order: &Order) -> usize {
    let mut total = 0;

    for (s, links) in problem.links.iter().enumerate() {
        let source_rank = ranks(&order[s]);
        let target_rank = ranks(&order[s + 1]);

        let placed: Vec<(usize, usize)> = links
            .iter()
            .map(|l| (source_rank[l.source], target_rank[l.target]))
            .collect();

        total += placed
            .iter()
            .tuple_combinations()
            .filter(|((s1, t1), (s2, t2))| (s1 < s2 && t1 > t2) || (s1 > s2 && t1 < t2))
            .count();
    }

    total
}

/// Sum of rank displacements of communities whose raw id is present in
/// consecutive slices
pub fn stability_cost(problem: &OrderingProblem, order: &Order) -> usize {
    let mut total = 0;

    for (s, carried) in problem.carried.iter().enumerate().skip(1) {
        let prev_rank = ranks(&order[s - 1]);
        let rank = ranks(&order[s]);
        total += carried
            .iter()
            .map(|&(prev, cur)| rank[cur].abs_diff(prev_rank[prev]))
            .sum::<usize>();
    }

    total
}

/// `crossings + stability_weight * stability_cost`
pub fn score(problem: &OrderingProblem, order: &Order, stability_weight: f64) -> f64 {
    crossings(problem, order) as f64 + stability_weight * stability_cost(problem, order) as f64
}
