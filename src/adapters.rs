//! Front ends translating Ising and QUBO models into factor tables.
//!
//! Domain index 0 encodes spin −1 (Ising) or bit 0 (QUBO); index 1 encodes
//! +1 / 1. With inverse temperature `beta`, the emitted tables sum to
//! `−β·H(x)`, so the log-sum-product problem value is the log partition
//! function. Building tables with `beta = −1` instead makes the sums equal
//! `H(x)` itself, which is how the optimization wrappers reuse the same
//! construction.

use crate::repr::{DomIndex, Table, VarLabel};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Spin (or bit) value encoded by a domain index, with `low` = −1 for Ising
/// and 0 for QUBO.
pub fn spin_of_index(idx: DomIndex, low: i8) -> i8 {
    if idx == 0 {
        low
    } else {
        1
    }
}

fn unary(v: usize, values: [f64; 2]) -> Arc<Table<f64>> {
    Arc::new(
        Table::with_values(&[VarLabel::new_usize(v)], &[2], values.to_vec())
            .expect("unary scope is valid"),
    )
}

fn pairwise(i: usize, j: usize, values: [f64; 4]) -> Arc<Table<f64>> {
    Arc::new(
        Table::with_values(
            &[VarLabel::new_usize(i), VarLabel::new_usize(j)],
            &[2, 2],
            values.to_vec(),
        )
        .expect("pairwise scope is valid"),
    )
}

/// Accumulate sparse couplings into one strength per unordered pair.
/// Diagonal entries are rejected.
fn coalesce_couplings(couplings: &[(usize, usize, f64)]) -> Result<BTreeMap<(usize, usize), f64>> {
    let mut merged = BTreeMap::new();
    for &(i, j, value) in couplings {
        if value == 0.0 {
            continue;
        }
        if i == j {
            return Err(Error::invalid(format!(
                "nonzero coupling on the diagonal at variable {}",
                i
            )));
        }
        *merged.entry((i.min(j), i.max(j))).or_insert(0.0) += value;
    }
    Ok(merged)
}

/// Tables for the Ising Hamiltonian `H(s) = Σ hᵢ sᵢ + Σ Jᵢⱼ sᵢ sⱼ` scaled by
/// `−β`: one unary table `(βh, −βh)` per nonzero field and one pairwise
/// table `(−βJ, βJ, βJ, −βJ)` per nonzero coupling.
pub fn ising_tables(
    h: &[f64],
    j: &[(usize, usize, f64)],
    beta: f64,
) -> Result<Vec<Arc<Table<f64>>>> {
    let mut tables = Vec::new();
    for (i, &field) in h.iter().enumerate() {
        if field != 0.0 {
            tables.push(unary(i, [beta * field, -beta * field]));
        }
    }
    for ((a, b), value) in coalesce_couplings(j)? {
        tables.push(pairwise(
            a,
            b,
            [-beta * value, beta * value, beta * value, -beta * value],
        ));
    }
    Ok(tables)
}

/// Tables for the QUBO objective `H(x) = Σ qᵢᵢ xᵢ + Σ qᵢⱼ xᵢ xⱼ` scaled by
/// `−β`: diagonal entries become unary `(0, −βq)`, off-diagonal entries
/// pairwise `(0, 0, 0, −βq)` with both orientations combined first.
pub fn qubo_tables(
    diagonal: &[f64],
    off_diagonal: &[(usize, usize, f64)],
    beta: f64,
) -> Result<Vec<Arc<Table<f64>>>> {
    let mut tables = Vec::new();
    for (i, &q) in diagonal.iter().enumerate() {
        if q != 0.0 {
            tables.push(unary(i, [0.0, -beta * q]));
        }
    }
    for ((a, b), value) in coalesce_couplings(off_diagonal)? {
        tables.push(pairwise(a, b, [0.0, 0.0, 0.0, -beta * value]));
    }
    Ok(tables)
}

/// Check an elimination order against the variable count: entries must be
/// in range and distinct. Missing variables are legal (they are clamped).
pub fn validate_var_order(var_order: &[VarLabel], num_vars: usize) -> Result<()> {
    let mut seen = vec![false; num_vars];
    for &v in var_order {
        let vi = v.value_usize();
        if vi >= num_vars {
            return Err(Error::invalid(format!(
                "elimination order contains {} but there are only {} variables",
                v, num_vars
            )));
        }
        if seen[vi] {
            return Err(Error::invalid(format!(
                "variable {} appears more than once in the elimination order",
                v
            )));
        }
        seen[vi] = true;
    }
    Ok(())
}

/// The smallest variable count covering an Ising/QUBO instance.
pub fn model_size(linear: &[f64], couplings: &[(usize, usize, f64)]) -> usize {
    let from_couplings = couplings
        .iter()
        .map(|&(i, j, _)| i.max(j) + 1)
        .max()
        .unwrap_or(0);
    linear.len().max(from_couplings)
}
