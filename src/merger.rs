//! Combines a list of tables into one table over a requested scope.
//!
//! `merge` first materializes the combined table over the union of the
//! requested scope and every input scope, then eliminates the out-of-scope
//! variables one at a time (ascending) by handing each unary slice to the
//! caller's marginalizer. Because `combine` is associative and commutative,
//! the elimination order inside one merge does not change the result for any
//! of the shipped algebras.

use crate::ops::{Marginalizer, Operations};
use crate::repr::{Table, TableVar, VarLabel};
use crate::{Result, Task};
use itertools::Itertools;
use std::sync::Arc;

pub struct TableMerger<'a, O: Operations> {
    task: &'a Task<O>,
}

/// Walks all assignments of `vars` in packed order, keeping one running
/// linear index per registered stride vector.
struct Odometer {
    dom_sizes: Vec<usize>,
    assignment: Vec<usize>,
}

impl Odometer {
    fn new(dom_sizes: Vec<usize>) -> Odometer {
        let n = dom_sizes.len();
        Odometer {
            dom_sizes,
            assignment: vec![0; n],
        }
    }

    /// Advance to the next assignment, updating each running index in
    /// `indices` through its stride vector. Returns false after the last
    /// assignment.
    fn step(&mut self, strides: &[Vec<usize>], indices: &mut [usize]) -> bool {
        for d in 0..self.assignment.len() {
            self.assignment[d] += 1;
            if self.assignment[d] < self.dom_sizes[d] {
                for (idx, st) in indices.iter_mut().zip(strides.iter()) {
                    *idx += st[d];
                }
                return true;
            }
            self.assignment[d] = 0;
            for (idx, st) in indices.iter_mut().zip(strides.iter()) {
                *idx -= st[d] * (self.dom_sizes[d] - 1);
            }
        }
        false
    }
}

impl<'a, O: Operations> TableMerger<'a, O> {
    pub fn new(task: &'a Task<O>) -> TableMerger<'a, O> {
        TableMerger { task }
    }

    /// Combine `tables` over `out_scope`, eliminating every other variable
    /// with `marginalizer`. `out_scope` must be strictly ascending; domain
    /// sizes come from the task, so variables no input mentions are simply
    /// broadcast.
    pub fn merge<M>(
        &self,
        out_scope: &[VarLabel],
        tables: &[Arc<Table<O::Value>>],
        marginalizer: &mut M,
    ) -> Result<Table<O::Value>>
    where
        M: Marginalizer<O::Value> + ?Sized,
    {
        let merge_scope: Vec<VarLabel> = out_scope
            .iter()
            .copied()
            .chain(tables.iter().flat_map(|t| t.scope().collect::<Vec<_>>()))
            .sorted()
            .dedup()
            .collect();
        let merge_doms: Vec<usize> = merge_scope
            .iter()
            .map(|&v| self.task.dom_size(v))
            .collect();

        let mut merged = self.fill(&merge_scope, &merge_doms, tables)?;
        for &v in &merge_scope {
            if out_scope.binary_search(&v).is_err() {
                merged = self.eliminate(merged, v, marginalizer)?;
            }
        }
        Ok(merged)
    }

    fn fill(
        &self,
        scope: &[VarLabel],
        dom_sizes: &[usize],
        tables: &[Arc<Table<O::Value>>],
    ) -> Result<Table<O::Value>> {
        let mut size = 1usize;
        for &d in dom_sizes {
            size = size.checked_mul(d).ok_or(crate::Error::Length)?;
        }

        // per-table stride over the merge scope (0 where a variable is absent)
        let strides: Vec<Vec<usize>> = tables
            .iter()
            .map(|t| {
                scope
                    .iter()
                    .map(|&v| t.var(v).map_or(0, |tv| tv.step_size))
                    .collect()
            })
            .collect();

        let mut values = Vec::with_capacity(size);
        let mut indices = vec![0usize; tables.len()];
        let mut odo = Odometer::new(dom_sizes.to_vec());
        loop {
            let mut v = self.task.combine_identity();
            for (t, &idx) in tables.iter().zip(indices.iter()) {
                v = self.task.combine(v, t[idx]);
            }
            values.push(v);
            if !odo.step(&strides, &mut indices) {
                break;
            }
        }

        Table::with_values(scope, dom_sizes, values)
    }

    /// Collapse variable `v` of `table`, calling the marginalizer once per
    /// remaining assignment.
    fn eliminate<M>(
        &self,
        table: Table<O::Value>,
        v: VarLabel,
        marginalizer: &mut M,
    ) -> Result<Table<O::Value>>
    where
        M: Marginalizer<O::Value> + ?Sized,
    {
        let elim = *table.var(v).expect("eliminated variable is in scope");
        let kept: Vec<TableVar> = table
            .vars()
            .iter()
            .copied()
            .filter(|tv| tv.index != v)
            .collect();
        let out_scope: Vec<VarLabel> = kept.iter().map(|tv| tv.index).collect();
        let out_doms: Vec<usize> = kept.iter().map(|tv| tv.dom_size).collect();
        let out_size: usize = out_doms.iter().product();

        let mut slice = Table::with_values(
            &[v],
            &[elim.dom_size],
            vec![self.task.combine_identity(); elim.dom_size],
        )?;

        let strides: Vec<Vec<usize>> = vec![kept.iter().map(|tv| tv.step_size).collect()];
        let mut values = Vec::with_capacity(out_size);
        let mut indices = vec![0usize];
        let mut odo = Odometer::new(out_doms.clone());
        for out_index in 0..out_size {
            let base = indices[0];
            for (j, s) in slice.values_mut().iter_mut().enumerate() {
                *s = table[base + j * elim.step_size];
            }
            values.push(marginalizer.marginalize(out_index, &slice));
            odo.step(&strides, &mut indices);
        }

        Table::with_values(&out_scope, &out_doms, values)
    }
}
