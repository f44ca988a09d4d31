//! Dense factor tables indexed by a sorted variable scope.
//!
//! A table over scope `v1 < v2 < ... < vk` with domain sizes `d1, ..., dk`
//! stores its `d1 * d2 * ... * dk` values in one packed array. The linear
//! index of assignment `(a1, ..., ak)` is `sum_i a_i * s_i` with `s_1 = 1`
//! and `s_{i+1} = s_i * d_i`, i.e. the first scope variable varies fastest.

use crate::repr::{DomIndex, VarLabel};
use crate::{Error, Result};
use std::ops::{Index, IndexMut};

/// One scope entry of a [`Table`]: the variable, its domain size, and the
/// stride its domain index contributes to the packed linear index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableVar {
    pub index: VarLabel,
    pub dom_size: usize,
    pub step_size: usize,
}

/// A dense multi-dimensional array of `V` values over a sorted variable
/// scope. The scope is fixed at construction; the value array stays
/// mutable so callers can fill tables in packed order.
///
/// ```
/// use rsbe::repr::{Table, VarLabel};
///
/// let t = Table::with_values(
///     &[VarLabel::new(5), VarLabel::new(8)],
///     &[3, 2],
///     vec![1, 2, 3, 4, 5, 6],
/// ).unwrap();
/// assert_eq!(t.size(), 6);
/// // x5 = 2, x8 = 1 -> linear index 2 + 3 * 1
/// assert_eq!(t[2 + 3], 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Table<V> {
    vars: Vec<TableVar>,
    values: Vec<V>,
}

impl<V> Table<V> {
    fn build_vars(scope: &[VarLabel], dom_sizes: &[usize]) -> Result<(Vec<TableVar>, usize)> {
        if scope.len() != dom_sizes.len() {
            return Err(Error::invalid(format!(
                "scope has {} variables but {} domain sizes were given",
                scope.len(),
                dom_sizes.len()
            )));
        }
        let mut vars = Vec::with_capacity(scope.len());
        let mut step: usize = 1;
        for (i, (&v, &d)) in scope.iter().zip(dom_sizes.iter()).enumerate() {
            if i > 0 && scope[i - 1] >= v {
                return Err(Error::invalid("table scope must be strictly ascending"));
            }
            if d == 0 {
                return Err(Error::invalid(format!("variable {} has domain size 0", v)));
            }
            vars.push(TableVar {
                index: v,
                dom_size: d,
                step_size: step,
            });
            step = step.checked_mul(d).ok_or(Error::Length)?;
        }
        Ok((vars, step))
    }

    /// Create a table with every value set to `V::default()`. Fails with
    /// [`Error::InvalidArgument`] on a malformed scope and [`Error::Length`]
    /// when the value count overflows the address space.
    pub fn new(scope: &[VarLabel], dom_sizes: &[usize]) -> Result<Table<V>>
    where
        V: Default + Clone,
    {
        let (vars, size) = Self::build_vars(scope, dom_sizes)?;
        Ok(Table {
            vars,
            values: vec![V::default(); size],
        })
    }

    /// Create a table from a packed value vector whose length must equal the
    /// product of the domain sizes.
    pub fn with_values(scope: &[VarLabel], dom_sizes: &[usize], values: Vec<V>) -> Result<Table<V>> {
        let (vars, size) = Self::build_vars(scope, dom_sizes)?;
        if values.len() != size {
            return Err(Error::invalid(format!(
                "table over {} assignments was given {} values",
                size,
                values.len()
            )));
        }
        Ok(Table { vars, values })
    }

    /// The scope entries, ascending by variable.
    pub fn vars(&self) -> &[TableVar] {
        &self.vars
    }

    /// Iterator over the scope variable labels.
    pub fn scope(&self) -> impl Iterator<Item = VarLabel> + '_ {
        self.vars.iter().map(|tv| tv.index)
    }

    /// Number of stored values (1 for an empty scope).
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.values
    }

    /// The scope entry for `v`, if `v` is in scope.
    pub fn var(&self, v: VarLabel) -> Option<&TableVar> {
        self.vars
            .binary_search_by_key(&v, |tv| tv.index)
            .ok()
            .map(|i| &self.vars[i])
    }

    /// Linear index of a full assignment to this table's scope, given as a
    /// dense per-variable vector indexed by `VarLabel`.
    pub fn index_of(&self, assignment: &[DomIndex]) -> usize {
        self.vars
            .iter()
            .map(|tv| assignment[tv.index.value_usize()] * tv.step_size)
            .sum()
    }
}

impl<V> Index<usize> for Table<V> {
    type Output = V;
    fn index(&self, i: usize) -> &V {
        &self.values[i]
    }
}

impl<V> IndexMut<usize> for Table<V> {
    fn index_mut(&mut self, i: usize) -> &mut V {
        &mut self.values[i]
    }
}
