//! Count-min operations: the optimum together with its multiplicity.
//!
//! Values are ⟨value, count⟩ pairs. Combining multiplies the counts while
//! adding the values; marginalizing keeps the minimum value and sums the
//! counts of every entry tied with it up to a relative tolerance, so nearly
//! degenerate optima arising from floating-point noise still count as ties.

use crate::ops::{Combine, Marginalizer, Operations, SolvableMarginalizer};
use crate::repr::{DomIndex, Table, VarLabel};
use crate::{Error, Result};

/// A value paired with the number of assignments achieving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueCount<Y> {
    pub value: Y,
    pub count: f64,
}

impl<Y> ValueCount<Y> {
    pub fn new(value: Y, count: f64) -> ValueCount<Y> {
        ValueCount { value, count }
    }

    /// A single assignment achieving `value`.
    pub fn single(value: Y) -> ValueCount<Y> {
        ValueCount { value, count: 1.0 }
    }
}

impl<Y: Combine> Combine for ValueCount<Y> {
    fn combine(self, other: Self) -> Self {
        ValueCount {
            value: self.value.combine(other.value),
            count: self.count * other.count,
        }
    }

    fn combine_inverse(self, other: Self) -> Self {
        ValueCount {
            value: self.value.combine_inverse(other.value),
            count: self.count / other.count,
        }
    }

    fn identity() -> Self {
        ValueCount {
            value: Y::identity(),
            count: 1.0,
        }
    }
}

/// Count-min operations with a user-supplied relative tie tolerance.
#[derive(Debug, Clone)]
pub struct CountOperations {
    rel_eps: f64,
}

impl CountOperations {
    pub fn new(rel_eps: f64) -> CountOperations {
        CountOperations { rel_eps }
    }

    pub fn rel_eps(&self) -> f64 {
        self.rel_eps
    }
}

/// `|a - b| <= eps * max(|a|, |b|)`; symmetric in its arguments.
fn approx_equal(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps * a.abs().max(b.abs())
}

impl Operations for CountOperations {
    type Value = ValueCount<f64>;
    type Solution = Vec<DomIndex>;

    fn marginalizer(&self) -> Result<Box<dyn Marginalizer<ValueCount<f64>>>> {
        Ok(Box::new(CountMinMarginalizer {
            rel_eps: self.rel_eps,
        }))
    }

    fn solvable_marginalizer(
        &self,
        _sep_vars: &[VarLabel],
        _sep_dom_sizes: &[usize],
        _elim_var: VarLabel,
        _elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<ValueCount<f64>, Vec<DomIndex>>>> {
        Err(Error::OperationUnavailable(
            "count operations cannot reconstruct solutions",
        ))
    }

    fn init_solution(&self, _x0: &[DomIndex]) -> Result<Vec<DomIndex>> {
        Err(Error::OperationUnavailable(
            "count operations cannot reconstruct solutions",
        ))
    }
}

/// Two passes over the slice: find the true minimum, then total the counts
/// of the entries within tolerance of it.
pub struct CountMinMarginalizer {
    rel_eps: f64,
}

impl Marginalizer<ValueCount<f64>> for CountMinMarginalizer {
    fn marginalize(&mut self, _out_index: usize, table: &Table<ValueCount<f64>>) -> ValueCount<f64> {
        let min = table
            .values()
            .iter()
            .map(|vc| vc.value)
            .fold(f64::INFINITY, f64::min);
        let count = table
            .values()
            .iter()
            .filter(|vc| approx_equal(vc.value, min, self.rel_eps))
            .map(|vc| vc.count)
            .sum();
        ValueCount { value: min, count }
    }
}
