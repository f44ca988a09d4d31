//! A `Task` bundles everything one inference problem needs: the shared
//! input tables, the domain sizes derived from them, the primal graph their
//! scopes induce, and the operations bundle that fixes the algebra.
//!
//! Tables are shared read-only: the task, bucket trees, and mergers all hold
//! `Arc`s to the same storage, so constructing a task never copies values.

use crate::ops::{Marginalizer, MinOperations, Operations, SolvableMarginalizer};
use crate::repr::{
    DomIndex, Graph, Maximize, Minimize, Table, TreeDecompNode, ValueOrder, VarLabel,
};
use crate::{Error, Result};
use bit_set::BitSet;
use std::sync::Arc;

pub struct Task<O: Operations> {
    ops: O,
    tables: Vec<Arc<Table<O::Value>>>,
    dom_sizes: Vec<usize>,
    graph: Graph,
}

impl<O: Operations> Task<O> {
    /// Build a task over `tables`. The variable count is the larger of
    /// `min_vars` and one past the largest scope variable; variables no
    /// table mentions get domain size 1. Tables disagreeing on a domain
    /// size fail with [`Error::InvalidArgument`].
    pub fn new(tables: Vec<Arc<Table<O::Value>>>, ops: O, min_vars: usize) -> Result<Task<O>> {
        let mut num_vars = min_vars;
        for t in &tables {
            if let Some(tv) = t.vars().last() {
                num_vars = num_vars.max(tv.index.value_usize() + 1);
            }
        }

        let mut dom_sizes: Vec<Option<usize>> = vec![None; num_vars];
        let mut edges = Vec::new();
        for t in &tables {
            for tv in t.vars() {
                let v = tv.index.value_usize();
                match dom_sizes[v] {
                    None => dom_sizes[v] = Some(tv.dom_size),
                    Some(d) if d != tv.dom_size => {
                        return Err(Error::invalid(format!(
                            "variable {} has conflicting domain sizes {} and {}",
                            tv.index, d, tv.dom_size
                        )))
                    }
                    Some(_) => {}
                }
            }
            for (i, a) in t.vars().iter().enumerate() {
                for b in &t.vars()[i + 1..] {
                    edges.push((a.index, b.index));
                }
            }
        }

        Ok(Task {
            ops,
            tables,
            dom_sizes: dom_sizes.into_iter().map(|d| d.unwrap_or(1)).collect(),
            graph: Graph::from_edges(edges, num_vars),
        })
    }

    pub fn num_vars(&self) -> usize {
        self.dom_sizes.len()
    }

    pub fn dom_size(&self, v: VarLabel) -> usize {
        self.dom_sizes[v.value_usize()]
    }

    pub fn dom_sizes(&self) -> &[usize] {
        &self.dom_sizes
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn tables(&self) -> &[Arc<Table<O::Value>>] {
        &self.tables
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn combine(&self, a: O::Value, b: O::Value) -> O::Value {
        self.ops.combine(a, b)
    }

    pub fn combine_identity(&self) -> O::Value {
        self.ops.combine_identity()
    }

    pub fn marginalizer(&self) -> Result<Box<dyn Marginalizer<O::Value>>> {
        self.ops.marginalizer()
    }

    pub fn solvable_marginalizer(
        &self,
        sep_vars: &[VarLabel],
        sep_dom_sizes: &[usize],
        elim_var: VarLabel,
        elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<O::Value, O::Solution>>> {
        self.ops
            .solvable_marginalizer(sep_vars, sep_dom_sizes, elim_var, elim_dom_size)
    }

    pub fn init_solution(&self, x0: &[DomIndex]) -> Result<O::Solution> {
        self.ops.init_solution(x0)
    }

    /// The input tables belonging to `node`'s bucket: those whose scope
    /// contains the node variable and fits inside the node's scope
    /// (`{node_var} ∪ sep_vars ∪ clamped_vars`). Clamped coordinates are
    /// fixed from `x0`; tables touching no clamped variable are shared
    /// rather than copied. Every input table lands in exactly one bucket of
    /// a decomposition, which is what keeps the upward pass from counting a
    /// factor twice.
    pub fn base_tables(
        &self,
        node: &TreeDecompNode,
        x0: &[DomIndex],
    ) -> Vec<Arc<Table<O::Value>>> {
        debug_assert_eq!(x0.len(), self.num_vars());
        let node_var = node.node_var();
        let in_scope = |v: VarLabel| {
            v == node_var
                || node.sep_vars().binary_search(&v).is_ok()
                || node.clamped_vars().binary_search(&v).is_ok()
        };

        let mut out = Vec::new();
        for t in &self.tables {
            if t.var(node_var).is_none() || !t.scope().all(&in_scope) {
                continue;
            }
            let clamped_in_scope: Vec<_> = t
                .vars()
                .iter()
                .filter(|tv| node.clamped_vars().binary_search(&tv.index).is_ok())
                .collect();
            if clamped_in_scope.is_empty() {
                out.push(Arc::clone(t));
                continue;
            }

            let base: usize = clamped_in_scope
                .iter()
                .map(|tv| x0[tv.index.value_usize()] * tv.step_size)
                .sum();
            let kept: Vec<_> = t
                .vars()
                .iter()
                .filter(|tv| node.clamped_vars().binary_search(&tv.index).is_err())
                .collect();
            let scope: Vec<VarLabel> = kept.iter().map(|tv| tv.index).collect();
            let doms: Vec<usize> = kept.iter().map(|tv| tv.dom_size).collect();

            let size: usize = doms.iter().product();
            let mut values = Vec::with_capacity(size);
            let mut assignment = vec![0usize; kept.len()];
            for _ in 0..size {
                let idx: usize = base
                    + kept
                        .iter()
                        .zip(assignment.iter())
                        .map(|(tv, &a)| a * tv.step_size)
                        .sum::<usize>();
                values.push(t[idx]);
                for (d, a) in assignment.iter_mut().enumerate() {
                    *a += 1;
                    if *a < doms[d] {
                        break;
                    }
                    *a = 0;
                }
            }
            out.push(Arc::new(
                Table::with_values(&scope, &doms, values).expect("projected scope is valid"),
            ));
        }
        out
    }

    /// Finalize the problem value after the upward pass: combine the root
    /// scalars with every input table depending only on clamped variables,
    /// evaluated at `x0`.
    pub fn problem_value(
        &self,
        root_values: &[O::Value],
        x0: &[DomIndex],
        clamped_vars: &[VarLabel],
    ) -> O::Value {
        debug_assert_eq!(x0.len(), self.num_vars());
        let mut clamped_mask = BitSet::with_capacity(self.num_vars());
        for v in clamped_vars {
            clamped_mask.insert(v.value_usize());
        }

        let mut value = self.combine_identity();
        for &rv in root_values {
            value = self.combine(value, rv);
        }
        for t in &self.tables {
            if t.scope().all(|v| clamped_mask.contains(v.value_usize())) {
                value = self.combine(value, t[t.index_of(x0)]);
            }
        }
        value
    }
}

impl<V, C> Task<MinOperations<V, C>>
where
    V: crate::ops::Combine + PartialOrd + 'static,
    C: ValueOrder<V> + 'static,
{
    /// Capacity of the solution sets produced by solvable bucket trees over
    /// this task. May be changed between building a tree and solving it.
    pub fn max_solutions(&self) -> usize {
        self.ops().max_solutions()
    }

    pub fn set_max_solutions(&self, max_solutions: usize) {
        self.ops().set_max_solutions(max_solutions);
    }
}

/// Task type for k-min optimization over `f64` energies.
pub type MinTask = Task<MinOperations<f64, Minimize>>;
/// Task type for k-max searches.
pub type MaxTask = Task<MinOperations<f64, Maximize>>;
/// Task type for counting tied optima.
pub type CountTask = Task<crate::ops::CountOperations>;
/// Task type for partition functions, sampling, and marginals.
pub type SampleTask = Task<crate::ops::LogSumProductOperations>;
