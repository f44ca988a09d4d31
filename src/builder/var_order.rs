//! Greedy elimination orders under a complexity budget.
//!
//! Classic greedy triangulation: repeatedly eliminate the cheapest variable
//! according to a heuristic cost, maintaining the fill-in graph as
//! elimination proceeds. Variables whose elimination would push some bucket
//! past the complexity budget are never eliminated; when nothing affordable
//! remains, one variable is *clamped* instead (removed from the graph
//! without elimination) and the search continues. The caller's `clamp_ranks`
//! steer which variables are sacrificed first.
//!
//! Tie-breaking is randomized: each step draws one number from the supplied
//! generator and picks inside a window of near-cheapest candidates whose
//! width is controlled by `selection_scale`. Scale 0 always takes the
//! cheapest-by-index variable; larger scales trade order quality for
//! diversity across restarts.

use crate::ops::Operations;
use crate::repr::VarLabel;
use crate::{Error, Result, Task};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

/// Cost function used to pick the next variable to eliminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// Number of neighbours.
    MinDegree,
    /// Domain size times summed neighbour domain sizes.
    WeightedMinDegree,
    /// Number of fill edges elimination would add.
    MinFill,
    /// Fill edges weighted by the product of their endpoint domains.
    WeightedMinFill,
}

struct VarState {
    processed: bool,
    adj: BTreeSet<usize>,
    dom_size: f64,
    clamp_rank: i32,
    clamp_value: f64,
    cost: f64,
    complexity: f64,
}

struct Search {
    vars: Vec<VarState>,
    heuristic: Heuristic,
}

impl Search {
    fn update(&mut self, v: usize) {
        let state = &self.vars[v];
        let mut complexity = state.dom_size.log2();
        for &u in &state.adj {
            complexity += self.vars[u].dom_size.log2();
        }
        let clamp_value = state.dom_size * state.adj.len() as f64;
        let cost = match self.heuristic {
            Heuristic::MinDegree => state.adj.len() as f64,
            Heuristic::WeightedMinDegree => clamp_value,
            Heuristic::MinFill => {
                let adj: Vec<usize> = state.adj.iter().copied().collect();
                let mut fill = 0.0;
                for (i, &u) in adj.iter().enumerate() {
                    for &w in &adj[i + 1..] {
                        if !self.vars[u].adj.contains(&w) {
                            fill += 1.0;
                        }
                    }
                }
                fill
            }
            Heuristic::WeightedMinFill => {
                let adj: Vec<usize> = state.adj.iter().copied().collect();
                let mut fill = 0.0;
                for (i, &u) in adj.iter().enumerate() {
                    for &w in &adj[i + 1..] {
                        if !self.vars[u].adj.contains(&w) {
                            fill += self.vars[u].dom_size * self.vars[w].dom_size;
                        }
                    }
                }
                fill
            }
        };
        let state = &mut self.vars[v];
        state.complexity = complexity;
        state.clamp_value = clamp_value;
        state.cost = cost;
    }

    /// Variables whose cost data changes when `v` is eliminated: direct
    /// neighbours for the degree heuristics, second neighbours too for the
    /// fill heuristics (their fill counts see the new clique edges).
    fn affected_by_elimination(&self, v: usize) -> Vec<usize> {
        match self.heuristic {
            Heuristic::MinDegree | Heuristic::WeightedMinDegree => {
                self.vars[v].adj.iter().copied().collect()
            }
            Heuristic::MinFill | Heuristic::WeightedMinFill => {
                let mut affected: FxHashSet<usize> = self.vars[v].adj.iter().copied().collect();
                for &u in &self.vars[v].adj {
                    affected.extend(self.vars[u].adj.iter().copied());
                }
                affected.remove(&v);
                affected.into_iter().collect()
            }
        }
    }
}

/// One randomized pick from a sorted candidate list: the window starts as
/// the leading group of `base_len` exact ties and is widened (or shrunk) by
/// `selection_scale`, never beyond `total_len`. Exactly one draw is
/// consumed per call, so fixing the generator fixes the whole order.
fn select(base_len: usize, total_len: usize, rng: &mut dyn FnMut() -> f64, scale: f32) -> usize {
    let window = (base_len as f64 * scale as f64).min(total_len as f64);
    let incr = (window * rng()).floor();
    (incr.max(0.0) as usize).min(total_len - 1)
}

/// Compute an elimination order for `task` whose induced tree decomposition
/// stays within `max_complexity`. Variables left out of the returned order
/// must be clamped; a negative `clamp_ranks` entry clamps the variable up
/// front, and lower non-negative ranks are sacrificed earlier when the
/// budget forces clamping.
///
/// Fails with [`Error::InvalidArgument`] when `clamp_ranks` is not exactly
/// one entry per task variable.
pub fn greedy_var_order<O: Operations>(
    task: &Task<O>,
    max_complexity: f64,
    clamp_ranks: &[i32],
    heuristic: Heuristic,
    rng: &mut dyn FnMut() -> f64,
    selection_scale: f32,
) -> Result<Vec<VarLabel>> {
    let num_vars = task.num_vars();
    if clamp_ranks.len() != num_vars {
        return Err(Error::invalid(format!(
            "clamp_ranks has {} entries but the task has {} variables",
            clamp_ranks.len(),
            num_vars
        )));
    }
    if num_vars == 0 {
        return Ok(Vec::new());
    }

    let graph = task.graph();
    let vars: Vec<VarState> = (0..num_vars)
        .map(|v| {
            let pre_clamped = clamp_ranks[v] < 0;
            let adj = if pre_clamped {
                BTreeSet::new()
            } else {
                graph
                    .neighbours(VarLabel::new_usize(v))
                    .iter()
                    .map(|w| w.value_usize())
                    .filter(|&w| clamp_ranks[w] >= 0)
                    .collect()
            };
            VarState {
                processed: pre_clamped,
                adj,
                dom_size: task.dom_size(VarLabel::new_usize(v)) as f64,
                clamp_rank: clamp_ranks[v],
                clamp_value: 0.0,
                cost: 0.0,
                complexity: 0.0,
            }
        })
        .collect();

    let mut search = Search { vars, heuristic };
    for v in 0..num_vars {
        search.update(v);
    }

    let mut order = Vec::new();
    loop {
        // affordable candidates, cheapest first
        let mut within: Vec<usize> = (0..num_vars)
            .filter(|&v| !search.vars[v].processed && search.vars[v].complexity <= max_complexity)
            .collect();
        within.sort_by(|&a, &b| {
            search.vars[a]
                .cost
                .partial_cmp(&search.vars[b].cost)
                .expect("costs are finite")
                .then(a.cmp(&b))
        });

        if let Some(&cheapest) = within.first() {
            let base_cost = search.vars[cheapest].cost;
            let base_len = within
                .iter()
                .take_while(|&&v| search.vars[v].cost == base_cost)
                .count();
            let v = within[select(base_len, within.len(), rng, selection_scale)];

            order.push(VarLabel::new_usize(v));
            search.vars[v].processed = true;
            let affected = search.affected_by_elimination(v);

            let neighbours: Vec<usize> = search.vars[v].adj.iter().copied().collect();
            for &u in &neighbours {
                let adj = &mut search.vars[u].adj;
                adj.remove(&v);
                for &w in &neighbours {
                    if w != u {
                        adj.insert(w);
                    }
                }
            }
            for u in affected {
                search.update(u);
            }
        } else {
            // nothing affordable: clamp one variable, best rank first
            let mut unprocessed: Vec<usize> =
                (0..num_vars).filter(|&v| !search.vars[v].processed).collect();
            if unprocessed.is_empty() {
                break;
            }
            unprocessed.sort_by(|&a, &b| {
                let (va, vb) = (&search.vars[a], &search.vars[b]);
                va.clamp_rank
                    .cmp(&vb.clamp_rank)
                    .then(
                        vb.clamp_value
                            .partial_cmp(&va.clamp_value)
                            .expect("clamp values are finite"),
                    )
                    .then(a.cmp(&b))
            });

            let head = &search.vars[unprocessed[0]];
            let (head_rank, head_value) = (head.clamp_rank, head.clamp_value);
            let total_len = unprocessed
                .iter()
                .take_while(|&&v| search.vars[v].clamp_rank == head_rank)
                .count();
            let base_len = unprocessed
                .iter()
                .take_while(|&&v| {
                    let s = &search.vars[v];
                    s.clamp_rank == head_rank && s.clamp_value == head_value
                })
                .count();
            let v = unprocessed[select(base_len, total_len, rng, selection_scale)];

            let rank = search.vars[v].clamp_rank;
            search.vars[v].processed = true;
            for u in 0..num_vars {
                if !search.vars[u].processed && search.vars[u].clamp_rank > rank {
                    search.vars[u].clamp_rank -= 1;
                }
            }
            let neighbours: Vec<usize> = search.vars[v].adj.iter().copied().collect();
            for &u in &neighbours {
                search.vars[u].adj.remove(&v);
            }
            for &u in &neighbours {
                search.update(u);
            }
        }

        if (0..num_vars).all(|v| search.vars[v].processed) {
            break;
        }
    }

    Ok(order)
}
