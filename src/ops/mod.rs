//! The pluggable algebra ("operations") driving the bucket-tree runtime.
//!
//! An operations bundle fixes three things: the scalar value type tables
//! hold, the associative-commutative `combine` used to multiply tables
//! together, and a *marginalizer* that collapses one variable of a unary
//! slice into a scalar. Swapping the bundle turns the same two-pass
//! traversal into different inference algorithms:
//!
//! | bundle | combine | marginalize | result |
//! |---|---|---|---|
//! | [`min::MinOperations`] | `+` | minimum | optimum / k-best states |
//! | [`logsumprod::LogSumProductOperations`] | `+` (log space) | log-sum-exp | log Z / samples |
//! | [`count::CountOperations`] | ⟨v₁+v₂, c₁·c₂⟩ | tolerant minimum | ⟨optimum, multiplicity⟩ |
//! | [`dummy::DummyOperations`] | no-op | unavailable | elimination orders only |
//!
//! Solvable marginalizers additionally remember enough per-separator-context
//! state during the upward pass (argmin candidates, conditional
//! distributions) to extend a partial solution during the downward pass.

pub mod count;
pub mod dummy;
pub mod logsumprod;
pub mod min;

pub use count::{CountOperations, ValueCount};
pub use dummy::DummyOperations;
pub use logsumprod::LogSumProductOperations;
pub use min::MinOperations;

use crate::repr::{DomIndex, Table, VarLabel};
use crate::Result;
use std::fmt::Debug;

/// Values combined along bucket-tree messages. `combine` is associative and
/// commutative with `identity` as its neutral element; `combine_inverse`
/// undoes one combination and is what lets k-best expansion express a
/// candidate as an offset from the bucket optimum.
pub trait Combine: Copy + Debug {
    fn combine(self, other: Self) -> Self;
    fn combine_inverse(self, other: Self) -> Self;
    fn identity() -> Self;
}

impl Combine for f64 {
    fn combine(self, other: Self) -> Self {
        self + other
    }
    fn combine_inverse(self, other: Self) -> Self {
        self - other
    }
    fn identity() -> Self {
        0.0
    }
}

impl Combine for i32 {
    fn combine(self, other: Self) -> Self {
        self + other
    }
    fn combine_inverse(self, other: Self) -> Self {
        self - other
    }
    fn identity() -> Self {
        0
    }
}

impl Combine for i64 {
    fn combine(self, other: Self) -> Self {
        self + other
    }
    fn combine_inverse(self, other: Self) -> Self {
        self - other
    }
    fn identity() -> Self {
        0
    }
}

impl Combine for () {
    fn combine(self, _other: Self) -> Self {}
    fn combine_inverse(self, _other: Self) -> Self {}
    fn identity() -> Self {}
}

/// Collapses one variable of a unary table into a scalar. `out_index` is the
/// packed index of the current separator assignment; the plain algebras
/// ignore it, the solvable ones key their recorded state by it.
pub trait Marginalizer<V> {
    fn marginalize(&mut self, out_index: usize, table: &Table<V>) -> V;
}

/// A marginalizer that can later *solve*: write the eliminated variable's
/// value into a partial solution whose separator variables are already
/// assigned.
pub trait SolvableMarginalizer<V, S>: Marginalizer<V> {
    fn solve(&self, solution: &mut S);
}

/// Packed step sizes used to read a separator context off a dense solution
/// vector: the context index is `sum solution[var] * step` over the pairs.
pub(crate) fn build_step_sizes(
    scope: &[VarLabel],
    dom_sizes: &[usize],
) -> Result<(Vec<(VarLabel, usize)>, usize)> {
    let mut steps = Vec::with_capacity(scope.len());
    let mut step = 1usize;
    for (&v, &d) in scope.iter().zip(dom_sizes.iter()) {
        steps.push((v, step));
        step = step.checked_mul(d).ok_or(crate::Error::Length)?;
    }
    Ok((steps, step))
}

pub(crate) fn context_index(steps: &[(VarLabel, usize)], solution: &[DomIndex]) -> usize {
    steps
        .iter()
        .map(|&(v, s)| solution[v.value_usize()] * s)
        .sum()
}

/// One operations bundle; a [`crate::Task`] owns exactly one.
pub trait Operations {
    type Value: Combine;
    type Solution;

    fn combine(&self, a: Self::Value, b: Self::Value) -> Self::Value {
        a.combine(b)
    }

    fn combine_identity(&self) -> Self::Value {
        Self::Value::identity()
    }

    /// A stateless marginalizer for the upward pass and for node-table
    /// merging.
    fn marginalizer(&self) -> Result<Box<dyn Marginalizer<Self::Value>>>;

    /// A per-node marginalizer that records downward-pass state while
    /// eliminating `elim_var` against the separator scope.
    fn solvable_marginalizer(
        &self,
        sep_vars: &[VarLabel],
        sep_dom_sizes: &[usize],
        elim_var: VarLabel,
        elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<Self::Value, Self::Solution>>>;

    /// The solution a downward pass starts from; clamped variables keep
    /// their `x0` entries.
    fn init_solution(&self, x0: &[DomIndex]) -> Result<Self::Solution>;
}
