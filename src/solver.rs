//! Table-level entry points: ordering, optimization, sampling, marginals,
//! and optimum counting, plus thin Ising/QUBO wrappers.
//!
//! These functions own the glue the core leaves to callers: defaulting
//! missing domains, validating elimination orders and initial states,
//! enforcing the complexity budget, offsetting solution values by the
//! problem value, and normalizing marginals. Variables below the variable
//! count that no table mentions are given an all-zero binary table, so a
//! free variable behaves like an unconstrained spin (its optimum is 0, it
//! contributes `ln 2` to the log partition function, and it samples
//! uniformly).

use crate::adapters::{ising_tables, model_size, qubo_tables, spin_of_index, validate_var_order};
use crate::builder::var_order;
use crate::ops::logsumprod::log_sum_exp;
use crate::ops::{CountOperations, DummyOperations, LogSumProductOperations, MinOperations, ValueCount};
use crate::repr::{DomIndex, Table, TreeDecomp, VarLabel};
use crate::task::{CountTask, MinTask, SampleTask};
use crate::{BucketTree, Error, Result, TableMerger, Task};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use crate::builder::var_order::Heuristic;

/// Result of [`optimize`]: energies weakly increasing, one solution row per
/// energy (empty when only the scalar optimum was requested).
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResult {
    pub energies: Vec<f64>,
    pub solutions: Vec<Vec<DomIndex>>,
}

/// One marginal distribution: a scope of one or two variables and its
/// normalized probabilities in packed table order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalEntry {
    pub vars: Vec<VarLabel>,
    pub values: Vec<f64>,
}

/// Result of [`sample`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub log_pf: f64,
    pub samples: Vec<Vec<DomIndex>>,
    pub marginals: Option<Vec<MarginalEntry>>,
    /// True when the interrupt callback stopped sampling early; `samples`
    /// then holds the draws completed so far.
    pub interrupted: bool,
}

/// Result of the Ising/QUBO sampling wrappers: samples as spin/bit values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinSampleResult {
    pub log_pf: f64,
    pub samples: Vec<Vec<i8>>,
    pub marginals: Option<Vec<MarginalEntry>>,
    pub interrupted: bool,
}

/// Variable count of a problem plus the synthesized binary tables for
/// variables nothing mentions.
fn pad_free_variables(
    tables: &[Arc<Table<f64>>],
    min_vars: usize,
) -> (Vec<Arc<Table<f64>>>, usize) {
    let mut num_vars = min_vars;
    let mut covered = FxHashSet::default();
    for t in tables {
        for tv in t.vars() {
            covered.insert(tv.index.value_usize());
            num_vars = num_vars.max(tv.index.value_usize() + 1);
        }
    }
    let mut padded = tables.to_vec();
    for v in 0..num_vars {
        if !covered.contains(&v) {
            padded.push(Arc::new(
                Table::with_values(&[VarLabel::new_usize(v)], &[2], vec![0.0, 0.0])
                    .expect("unary scope is valid"),
            ));
        }
    }
    (padded, num_vars)
}

fn build_x0<O: crate::ops::Operations>(
    init_state: Option<&[DomIndex]>,
    task: &Task<O>,
) -> Result<Vec<DomIndex>> {
    match init_state {
        None => Ok(vec![0; task.num_vars()]),
        Some(x0) if x0.len() == task.num_vars() => Ok(x0.to_vec()),
        Some(x0) => Err(Error::invalid(format!(
            "initial state has {} entries but the problem has {} variables",
            x0.len(),
            task.num_vars()
        ))),
    }
}

fn check_complexity(decomp: &TreeDecomp, max_complexity: f64) -> Result<()> {
    if decomp.complexity() > max_complexity {
        return Err(Error::ComplexityExceeded {
            complexity: decomp.complexity(),
            max_complexity,
        });
    }
    Ok(())
}

/// Compute an elimination order for `tables` within `max_complexity` using
/// the given heuristic; see [`var_order::greedy_var_order`] for the search
/// itself. `clamp_ranks` defaults to all zeros.
pub fn greedy_var_order(
    tables: &[Arc<Table<f64>>],
    max_complexity: f64,
    clamp_ranks: Option<&[i32]>,
    heuristic: Heuristic,
    selection_scale: f32,
    rng: &mut dyn FnMut() -> f64,
) -> Result<Vec<VarLabel>> {
    let (padded, num_vars) = pad_free_variables(tables, 0);
    // ordering never reads values, so strip them
    let scopes: Vec<Arc<Table<()>>> = padded
        .iter()
        .map(|t| {
            let scope: Vec<VarLabel> = t.scope().collect();
            let doms: Vec<usize> = t.vars().iter().map(|tv| tv.dom_size).collect();
            Ok(Arc::new(Table::new(&scope, &doms)?))
        })
        .collect::<Result<_>>()?;
    let task: Task<DummyOperations> = Task::new(scopes, DummyOperations, num_vars)?;

    let default_ranks;
    let ranks = match clamp_ranks {
        Some(r) => r,
        None => {
            default_ranks = vec![0; task.num_vars()];
            &default_ranks
        }
    };
    var_order::greedy_var_order(&task, max_complexity, ranks, heuristic, rng, selection_scale)
}

/// Find the optimum of the summed tables, and with `max_solutions > 0` the
/// best `max_solutions` assignments (ties broken lexicographically).
pub fn optimize(
    tables: &[Arc<Table<f64>>],
    var_order: &[VarLabel],
    max_complexity: f64,
    max_solutions: usize,
    init_state: Option<&[DomIndex]>,
    min_vars: usize,
) -> Result<OptimizeResult> {
    let (padded, num_vars) = pad_free_variables(tables, min_vars);
    let task: MinTask = Task::new(padded, MinOperations::new(1), num_vars)?;
    validate_var_order(var_order, task.num_vars())?;
    let x0 = build_x0(init_state, &task)?;

    let decomp = TreeDecomp::new(task.graph(), var_order, task.dom_sizes())?;
    check_complexity(&decomp, max_complexity)?;

    let solvable = max_solutions > 0;
    let tree = BucketTree::new(&task, &decomp, x0, solvable, false)?;
    let base_value = tree.problem_value();
    if !solvable {
        return Ok(OptimizeResult {
            energies: vec![base_value],
            solutions: Vec::new(),
        });
    }

    task.set_max_solutions(max_solutions);
    let solution_set = tree.solve()?;
    let mut energies = Vec::with_capacity(solution_set.solutions().len());
    let mut solutions = Vec::with_capacity(solution_set.solutions().len());
    for s in solution_set.solutions() {
        energies.push(base_value + s.value);
        solutions.push(s.solution.clone());
    }
    Ok(OptimizeResult {
        energies,
        solutions,
    })
}

/// Draw `num_samples` exact Boltzmann samples from `p(x) ∝ exp(Σ T(x))` and
/// report the log partition function; optionally also the node and
/// node-separator marginals. The interrupt callback is polled between
/// draws; returning true stops early with the partial sample set.
#[allow(clippy::too_many_arguments)]
pub fn sample(
    tables: &[Arc<Table<f64>>],
    var_order: &[VarLabel],
    max_complexity: f64,
    num_samples: usize,
    init_state: Option<&[DomIndex]>,
    min_vars: usize,
    seed: Option<u64>,
    return_marginals: bool,
    mut interrupt: Option<&mut dyn FnMut() -> bool>,
) -> Result<SampleResult> {
    let (padded, num_vars) = pad_free_variables(tables, min_vars);

    let rng: Box<dyn FnMut() -> f64> = match seed {
        Some(s) => {
            let mut rng = StdRng::seed_from_u64(s);
            Box::new(move || rng.gen::<f64>())
        }
        None => {
            let mut rng = StdRng::from_entropy();
            Box::new(move || rng.gen::<f64>())
        }
    };
    let task: SampleTask = Task::new(padded, LogSumProductOperations::new(rng), num_vars)?;
    validate_var_order(var_order, task.num_vars())?;
    let x0 = build_x0(init_state, &task)?;

    let decomp = TreeDecomp::new(task.graph(), var_order, task.dom_sizes())?;
    check_complexity(&decomp, max_complexity)?;

    let solvable = num_samples > 0;
    let tree = BucketTree::new(&task, &decomp, x0, solvable, return_marginals)?;
    let log_pf = tree.problem_value();

    let mut samples = Vec::with_capacity(num_samples);
    let mut interrupted = false;
    for i in 0..num_samples {
        if i > 0 {
            if let Some(stop) = interrupt.as_deref_mut() {
                if stop() {
                    interrupted = true;
                    break;
                }
            }
        }
        samples.push(tree.solve()?);
    }

    let marginals = if return_marginals {
        Some(extract_marginals(&task, &tree)?)
    } else {
        None
    };

    Ok(SampleResult {
        log_pf,
        samples,
        marginals,
        interrupted,
    })
}

/// The optimum together with the number of assignments achieving it, ties
/// taken up to the relative tolerance `rel_eps`.
pub fn min_count(
    tables: &[Arc<Table<f64>>],
    var_order: &[VarLabel],
    max_complexity: f64,
    rel_eps: f64,
    init_state: Option<&[DomIndex]>,
    min_vars: usize,
) -> Result<(f64, f64)> {
    let (padded, num_vars) = pad_free_variables(tables, min_vars);
    let counted: Vec<Arc<Table<ValueCount<f64>>>> = padded
        .iter()
        .map(|t| {
            let scope: Vec<VarLabel> = t.scope().collect();
            let doms: Vec<usize> = t.vars().iter().map(|tv| tv.dom_size).collect();
            let values = t.values().iter().map(|&v| ValueCount::single(v)).collect();
            Ok(Arc::new(Table::with_values(&scope, &doms, values)?))
        })
        .collect::<Result<_>>()?;
    let task: CountTask = Task::new(counted, CountOperations::new(rel_eps), num_vars)?;
    validate_var_order(var_order, task.num_vars())?;
    let x0 = build_x0(init_state, &task)?;

    let decomp = TreeDecomp::new(task.graph(), var_order, task.dom_sizes())?;
    check_complexity(&decomp, max_complexity)?;

    let tree = BucketTree::new(&task, &decomp, x0, false, false)?;
    let pv = tree.problem_value();
    Ok((pv.value, pv.count))
}

/// Single-variable marginals for every node variable and pairwise marginals
/// for the bucket tree's (node, separator) pairs that appear as an input
/// pairwise scope; every distribution is normalized from that node's
/// retained tables.
fn extract_marginals(
    task: &SampleTask,
    tree: &BucketTree<LogSumProductOperations>,
) -> Result<Vec<MarginalEntry>> {
    let merger = TableMerger::new(task);
    let node_tables = tree.node_tables()?;

    let mut singles: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    for nt in node_tables {
        let mut mrg = task.marginalizer()?;
        let merged = merger.merge(&[nt.node_var], &nt.tables, mrg.as_mut())?;
        singles.insert(nt.node_var.value(), normalize(merged.values()));
    }

    let input_pairs: FxHashSet<(u64, u64)> = task
        .tables()
        .iter()
        .filter(|t| t.vars().len() == 2)
        .map(|t| (t.vars()[0].index.value(), t.vars()[1].index.value()))
        .collect();

    let mut pairs: BTreeMap<(u64, u64), Vec<f64>> = BTreeMap::new();
    for nt in node_tables {
        for &sep in &nt.sep_vars {
            let key = (
                nt.node_var.value().min(sep.value()),
                nt.node_var.value().max(sep.value()),
            );
            if !input_pairs.contains(&key) || pairs.contains_key(&key) {
                continue;
            }
            let scope = [VarLabel::new(key.0), VarLabel::new(key.1)];
            let mut mrg = task.marginalizer()?;
            let merged = merger.merge(&scope, &nt.tables, mrg.as_mut())?;
            pairs.insert(key, normalize(merged.values()));
        }
    }

    let mut out = Vec::with_capacity(singles.len() + pairs.len());
    for (v, values) in singles {
        out.push(MarginalEntry {
            vars: vec![VarLabel::new(v)],
            values,
        });
    }
    for ((a, b), values) in pairs {
        out.push(MarginalEntry {
            vars: vec![VarLabel::new(a), VarLabel::new(b)],
            values,
        });
    }
    Ok(out)
}

fn normalize(log_weights: &[f64]) -> Vec<f64> {
    let log_z = log_sum_exp(log_weights);
    log_weights.iter().map(|v| (v - log_z).exp()).collect()
}

fn spins(samples: Vec<Vec<DomIndex>>, low: i8) -> Vec<Vec<i8>> {
    samples
        .into_iter()
        .map(|s| s.into_iter().map(|idx| spin_of_index(idx, low)).collect())
        .collect()
}

/// Minimize the Ising Hamiltonian `H(s) = Σ hᵢ sᵢ + Σ Jᵢⱼ sᵢ sⱼ`; solutions
/// are spin vectors over {−1, +1}.
pub fn optimize_ising(
    h: &[f64],
    j: &[(usize, usize, f64)],
    var_order: &[VarLabel],
    max_complexity: f64,
    max_solutions: usize,
) -> Result<(Vec<f64>, Vec<Vec<i8>>)> {
    let tables = ising_tables(h, j, -1.0)?;
    let res = optimize(
        &tables,
        var_order,
        max_complexity,
        max_solutions,
        None,
        model_size(h, j),
    )?;
    let spins = spins(res.solutions, -1);
    Ok((res.energies, spins))
}

/// Minimize the QUBO objective `x·Q·x`; solutions are bit vectors.
pub fn optimize_qubo(
    diagonal: &[f64],
    off_diagonal: &[(usize, usize, f64)],
    var_order: &[VarLabel],
    max_complexity: f64,
    max_solutions: usize,
) -> Result<(Vec<f64>, Vec<Vec<i8>>)> {
    let tables = qubo_tables(diagonal, off_diagonal, -1.0)?;
    let res = optimize(
        &tables,
        var_order,
        max_complexity,
        max_solutions,
        None,
        model_size(diagonal, off_diagonal),
    )?;
    let spins = spins(res.solutions, 0);
    Ok((res.energies, spins))
}

/// Sample the Ising Boltzmann distribution `p(s) ∝ exp(−β H(s))`.
#[allow(clippy::too_many_arguments)]
pub fn sample_ising(
    h: &[f64],
    j: &[(usize, usize, f64)],
    var_order: &[VarLabel],
    max_complexity: f64,
    num_samples: usize,
    beta: f64,
    seed: Option<u64>,
    return_marginals: bool,
) -> Result<SpinSampleResult> {
    let tables = ising_tables(h, j, beta)?;
    let res = sample(
        &tables,
        var_order,
        max_complexity,
        num_samples,
        None,
        model_size(h, j),
        seed,
        return_marginals,
        None,
    )?;
    Ok(SpinSampleResult {
        log_pf: res.log_pf,
        samples: spins(res.samples, -1),
        marginals: res.marginals,
        interrupted: res.interrupted,
    })
}

/// Sample the QUBO Boltzmann distribution `p(x) ∝ exp(−β x·Q·x)`.
#[allow(clippy::too_many_arguments)]
pub fn sample_qubo(
    diagonal: &[f64],
    off_diagonal: &[(usize, usize, f64)],
    var_order: &[VarLabel],
    max_complexity: f64,
    num_samples: usize,
    beta: f64,
    seed: Option<u64>,
    return_marginals: bool,
) -> Result<SpinSampleResult> {
    let tables = qubo_tables(diagonal, off_diagonal, beta)?;
    let res = sample(
        &tables,
        var_order,
        max_complexity,
        num_samples,
        None,
        model_size(diagonal, off_diagonal),
        seed,
        return_marginals,
        None,
    )?;
    Ok(SpinSampleResult {
        log_pf: res.log_pf,
        samples: spins(res.samples, 0),
        marginals: res.marginals,
        interrupted: res.interrupted,
    })
}
