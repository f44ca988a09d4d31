//! Log-sum-product operations: partition functions and exact Boltzmann
//! sampling.
//!
//! Values are log-weights, so combining tables is addition and eliminating a
//! variable is a log-sum-exp. The solvable form remembers the normalized
//! conditional distribution of the eliminated variable for every separator
//! context; the downward pass then draws the variable from that conditional,
//! consuming one `[0,1)` number per call. Randomness enters only through an
//! explicit draw function; there is no hidden thread-local generator in the
//! engine.

use crate::ops::{build_step_sizes, context_index, Marginalizer, Operations, SolvableMarginalizer};
use crate::repr::{DomIndex, Table, VarLabel};
use crate::Result;
use std::cell::RefCell;
use std::rc::Rc;

/// A shared source of uniform draws from `[0, 1)`.
pub type UnitRng = Rc<RefCell<Box<dyn FnMut() -> f64>>>;

/// Log-sum-product operations over `f64` log-weights.
///
/// ```
/// use rsbe::ops::LogSumProductOperations;
/// use rand::{rngs::StdRng, Rng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let ops = LogSumProductOperations::new(Box::new(move || rng.gen::<f64>()));
/// ```
pub struct LogSumProductOperations {
    rng: UnitRng,
}

impl LogSumProductOperations {
    pub fn new(rng: Box<dyn FnMut() -> f64>) -> LogSumProductOperations {
        LogSumProductOperations {
            rng: Rc::new(RefCell::new(rng)),
        }
    }
}

impl Operations for LogSumProductOperations {
    type Value = f64;
    type Solution = Vec<DomIndex>;

    fn marginalizer(&self) -> Result<Box<dyn Marginalizer<f64>>> {
        Ok(Box::new(LogSumMarginalizer))
    }

    fn solvable_marginalizer(
        &self,
        sep_vars: &[VarLabel],
        sep_dom_sizes: &[usize],
        elim_var: VarLabel,
        elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<f64, Vec<DomIndex>>>> {
        let (steps, num_contexts) = build_step_sizes(sep_vars, sep_dom_sizes)?;
        Ok(Box::new(SolvableLogSumMarginalizer {
            steps,
            elim_var,
            elim_dom_size,
            conditionals: vec![Vec::new(); num_contexts],
            rng: Rc::clone(&self.rng),
        }))
    }

    fn init_solution(&self, x0: &[DomIndex]) -> Result<Vec<DomIndex>> {
        Ok(x0.to_vec())
    }
}

/// `max + ln(sum(exp(v - max)))` over the slice; the shift keeps the sum
/// finite for large-magnitude log-weights.
pub struct LogSumMarginalizer;

pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

impl Marginalizer<f64> for LogSumMarginalizer {
    fn marginalize(&mut self, _out_index: usize, table: &Table<f64>) -> f64 {
        log_sum_exp(table.values())
    }
}

/// The sampling form: keeps the conditional of the eliminated variable per
/// separator context and draws from it during the downward pass.
pub struct SolvableLogSumMarginalizer {
    steps: Vec<(VarLabel, usize)>,
    elim_var: VarLabel,
    elim_dom_size: usize,
    /// normalized probabilities, one vector of `elim_dom_size` per context
    conditionals: Vec<Vec<f64>>,
    rng: UnitRng,
}

impl Marginalizer<f64> for SolvableLogSumMarginalizer {
    fn marginalize(&mut self, out_index: usize, table: &Table<f64>) -> f64 {
        debug_assert_eq!(table.size(), self.elim_dom_size);
        let max = table
            .values()
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = table.values().iter().map(|v| (v - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        self.conditionals[out_index] = weights.iter().map(|w| w / total).collect();
        max + total.ln()
    }
}

impl SolvableMarginalizer<f64, Vec<DomIndex>> for SolvableLogSumMarginalizer {
    fn solve(&self, solution: &mut Vec<DomIndex>) {
        let ctx = context_index(&self.steps, solution);
        let conditional = &self.conditionals[ctx];
        debug_assert!(!conditional.is_empty(), "context never marginalized");
        let mut rng = self.rng.borrow_mut();
        let u = (*rng)();
        // smallest index whose cumulative probability reaches the draw
        let mut cumulative = 0.0;
        let mut drawn = conditional.len() - 1;
        for (i, p) in conditional.iter().enumerate() {
            cumulative += p;
            if cumulative >= u {
                drawn = i;
                break;
            }
        }
        solution[self.elim_var.value_usize()] = drawn;
    }
}
