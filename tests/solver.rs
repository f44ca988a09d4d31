//! End-to-end tests of the table-level entry points: ordering, k-best
//! optimization, sampling with marginals, counting, the Ising/QUBO
//! wrappers, and the documented boundary behaviours.

use rsbe::repr::{Table, VarLabel};
use rsbe::solver::{self, Heuristic};
use rsbe::Error;
use std::sync::Arc;

fn labels(vs: &[u64]) -> Vec<VarLabel> {
    vs.iter().map(|&v| VarLabel::new(v)).collect()
}

fn tbl(scope: &[u64], doms: &[usize], values: &[f64]) -> Arc<Table<f64>> {
    Arc::new(Table::with_values(&labels(scope), doms, values.to_vec()).unwrap())
}

/// Five binary variables, six zero pairwise couplings on the cycle-like
/// graph 0-1, 1-2, 1-3, 2-3, 2-4, 3-4, optional unary fields.
fn five_var_model(fields: &[f64; 5]) -> Vec<Arc<Table<f64>>> {
    let mut tables: Vec<Arc<Table<f64>>> = fields
        .iter()
        .enumerate()
        .map(|(v, &a)| tbl(&[v as u64], &[2], &[a, -a]))
        .collect();
    for &(i, j) in &[(0u64, 1u64), (1, 2), (1, 3), (2, 3), (2, 4), (3, 4)] {
        tables.push(tbl(&[i, j], &[2, 2], &[0.0, 0.0, 0.0, 0.0]));
    }
    tables
}

fn full_order(n: u64) -> Vec<VarLabel> {
    (0..n).map(VarLabel::new).collect()
}

#[test]
fn zero_field_cycle_ties_lexicographically() {
    let tables = five_var_model(&[0.0; 5]);
    let order = solver::greedy_var_order(
        &tables,
        3.0,
        None,
        Heuristic::MinFill,
        1.0,
        &mut || 0.3,
    )
    .unwrap();
    let mut sorted: Vec<u64> = order.iter().map(|v| v.value()).collect();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![0, 1, 2, 3, 4]);

    let res = solver::optimize(&tables, &order, 3.0, 3, None, 0).unwrap();
    assert_eq!(res.energies, vec![0.0, 0.0, 0.0]);
    assert_eq!(
        res.solutions,
        vec![
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 1],
            vec![0, 0, 0, 1, 0],
        ]
    );
}

#[test]
fn biased_fields_give_the_two_best_energies() {
    let tables = five_var_model(&[2.0, 1.0, -2.0, 3.0, -4.0]);
    let res = solver::optimize(&tables, &full_order(5), 3.0, 2, None, 0).unwrap();
    assert_eq!(res.energies, vec![-12.0, -10.0]);
    // each variable takes the side with value -|a|; the runner-up flips the
    // weakest field (variable 1)
    assert_eq!(res.solutions[0], vec![1, 1, 0, 1, 0]);
    assert_eq!(res.solutions[1], vec![1, 0, 0, 1, 0]);
}

#[test]
fn scalar_optimum_matches_the_best_solution() {
    let tables = five_var_model(&[2.0, 1.0, -2.0, 3.0, -4.0]);
    let scalar = solver::optimize(&tables, &full_order(5), 3.0, 0, None, 0).unwrap();
    assert_eq!(scalar.energies, vec![-12.0]);
    assert!(scalar.solutions.is_empty());
}

#[test]
fn two_variable_sampler_statistics() {
    let tables = vec![
        tbl(&[0], &[2], &[0.0, 3.0f64.ln()]),
        tbl(&[1], &[2], &[2.0f64.ln(), 2.0f64.ln()]),
    ];
    let res = solver::sample(
        &tables,
        &full_order(2),
        2.0,
        10_000,
        None,
        0,
        Some(42),
        true,
        None,
    )
    .unwrap();

    assert!((res.log_pf - 16.0f64.ln()).abs() < 1e-9);
    assert_eq!(res.samples.len(), 10_000);
    assert!(!res.interrupted);

    let marginals = res.marginals.as_ref().unwrap();
    assert_eq!(marginals.len(), 2);
    assert_eq!(marginals[0].vars, labels(&[0]));
    assert!((marginals[0].values[0] - 0.25).abs() < 1e-9);
    assert!((marginals[0].values[1] - 0.75).abs() < 1e-9);
    assert_eq!(marginals[1].vars, labels(&[1]));
    assert!((marginals[1].values[0] - 0.5).abs() < 1e-9);

    // empirical frequencies agree within a few standard errors
    let freq0 = res.samples.iter().filter(|s| s[0] == 1).count() as f64 / 10_000.0;
    let freq1 = res.samples.iter().filter(|s| s[1] == 1).count() as f64 / 10_000.0;
    assert!((freq0 - 0.75).abs() < 0.02, "freq0 = {}", freq0);
    assert!((freq1 - 0.5).abs() < 0.02, "freq1 = {}", freq1);
}

#[test]
fn marginals_sum_to_one() {
    let tables = vec![
        tbl(&[0], &[2], &[0.4, -0.9]),
        tbl(&[1], &[2], &[-0.3, 0.8]),
        tbl(&[2], &[2], &[0.1, 0.2]),
        tbl(&[0, 1], &[2, 2], &[0.5, -0.2, 0.3, 0.9]),
        tbl(&[1, 2], &[2, 2], &[-0.7, 0.4, 0.0, 0.6]),
    ];
    let res = solver::sample(&tables, &full_order(3), 2.0, 0, None, 0, Some(7), true, None)
        .unwrap();
    let marginals = res.marginals.unwrap();
    // three singles and both input pairs
    assert_eq!(marginals.len(), 5);
    for m in &marginals {
        let total: f64 = m.values.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "scope {:?}", m.vars);
        let expected_len = if m.vars.len() == 1 { 2 } else { 4 };
        assert_eq!(m.values.len(), expected_len);
    }
}

#[test]
fn excessive_complexity_is_reported() {
    // complete graph on 10 binary variables
    let mut tables = Vec::new();
    for i in 0..10u64 {
        for j in i + 1..10 {
            tables.push(tbl(&[i, j], &[2, 2], &[0.0, 0.0, 0.0, 0.0]));
        }
    }
    let res = solver::optimize(&tables, &full_order(10), 5.0, 1, None, 0);
    assert!(matches!(res, Err(Error::ComplexityExceeded { .. })));

    // the heuristic still returns, clamping enough variables to fit
    let order = solver::greedy_var_order(
        &tables,
        5.0,
        None,
        Heuristic::MinDegree,
        1.0,
        &mut || 0.6,
    )
    .unwrap();
    assert!(order.len() < 10);
    let res = solver::optimize(&tables, &order, 5.0, 1, None, 0).unwrap();
    assert_eq!(res.energies, vec![0.0]);
}

#[test]
fn reseeding_reproduces_samples_bit_exactly() {
    let tables = five_var_model(&[0.5, -0.25, 1.5, 0.0, -1.0]);
    let run = || {
        solver::sample(
            &tables,
            &full_order(5),
            3.0,
            64,
            None,
            0,
            Some(1234),
            false,
            None,
        )
        .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.log_pf.to_bits(), b.log_pf.to_bits());
    assert_eq!(a.samples, b.samples);
}

#[test]
fn table_order_does_not_change_results() {
    let mut tables = five_var_model(&[2.0, 1.0, -2.0, 3.0, -4.0]);
    let forward = solver::optimize(&tables, &full_order(5), 3.0, 4, None, 0).unwrap();
    let forward_log_pf =
        solver::sample(&tables, &full_order(5), 3.0, 0, None, 0, Some(1), false, None)
            .unwrap()
            .log_pf;

    tables.reverse();
    let reversed = solver::optimize(&tables, &full_order(5), 3.0, 4, None, 0).unwrap();
    let reversed_log_pf =
        solver::sample(&tables, &full_order(5), 3.0, 0, None, 0, Some(2), false, None)
            .unwrap()
            .log_pf;

    assert_eq!(forward.energies, reversed.energies);
    assert_eq!(forward.solutions, reversed.solutions);
    assert!((forward_log_pf - reversed_log_pf).abs() < 1e-9);
}

#[test]
fn empty_table_list_defaults_to_free_binary_variables() {
    let res = solver::optimize(&[], &full_order(4), 4.0, 1, None, 4).unwrap();
    assert_eq!(res.energies, vec![0.0]);
    assert_eq!(res.solutions, vec![vec![0, 0, 0, 0]]);

    let sampled =
        solver::sample(&[], &full_order(4), 4.0, 0, None, 4, Some(3), false, None).unwrap();
    assert!((sampled.log_pf - 4.0 * 2.0f64.ln()).abs() < 1e-9);
}

#[test]
fn empty_elimination_order_evaluates_the_initial_state() {
    let tables = vec![
        tbl(&[0], &[2], &[1.0, 4.0]),
        tbl(&[1], &[2], &[2.0, 8.0]),
        tbl(&[0, 1], &[2, 2], &[0.5, 0.0, 0.0, 0.25]),
    ];
    let res = solver::optimize(&tables, &[], 2.0, 0, Some(&[1, 1]), 0).unwrap();
    assert_eq!(res.energies, vec![4.0 + 8.0 + 0.25]);
}

#[test]
fn single_variable_boundary() {
    let (a, b) = (0.75, -0.5);
    let tables = vec![tbl(&[0], &[2], &[a, b])];
    let res = solver::optimize(&tables, &full_order(1), 1.0, 1, None, 0).unwrap();
    assert_eq!(res.energies, vec![b]);

    let sampled =
        solver::sample(&tables, &full_order(1), 1.0, 0, None, 0, Some(5), true, None).unwrap();
    let expected_log_pf = (a.exp() + b.exp()).ln();
    assert!((sampled.log_pf - expected_log_pf).abs() < 1e-9);
    let marginals = sampled.marginals.unwrap();
    let z = a.exp() + b.exp();
    assert!((marginals[0].values[0] - a.exp() / z).abs() < 1e-9);
    assert!((marginals[0].values[1] - b.exp() / z).abs() < 1e-9);
}

#[test]
fn bad_arguments_are_rejected() {
    let tables = five_var_model(&[0.0; 5]);

    let repeated = labels(&[0, 0, 1]);
    assert!(matches!(
        solver::optimize(&tables, &repeated, 3.0, 1, None, 0),
        Err(Error::InvalidArgument(_))
    ));

    let out_of_range = labels(&[0, 9]);
    assert!(matches!(
        solver::optimize(&tables, &out_of_range, 3.0, 1, None, 0),
        Err(Error::InvalidArgument(_))
    ));

    let short_state = [0usize; 2];
    assert!(matches!(
        solver::optimize(&tables, &full_order(5), 3.0, 1, Some(&short_state), 0),
        Err(Error::InvalidArgument(_))
    ));

    let bad_state = [0usize, 0, 0, 0, 7];
    assert!(matches!(
        solver::optimize(&tables, &full_order(5), 3.0, 1, Some(&bad_state), 0),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn interrupt_stops_between_samples() {
    let tables = five_var_model(&[0.0; 5]);
    let mut calls = 0usize;
    let mut stop_after_three = || {
        calls += 1;
        calls >= 3
    };
    let res = solver::sample(
        &tables,
        &full_order(5),
        3.0,
        100,
        None,
        0,
        Some(11),
        false,
        Some(&mut stop_after_three),
    )
    .unwrap();
    assert!(res.interrupted);
    assert_eq!(res.samples.len(), 3);
}

#[test]
fn min_count_counts_tied_optima() {
    // every assignment of the zero-field model has energy 0
    let tables = five_var_model(&[0.0; 5]);
    let (value, count) =
        solver::min_count(&tables, &full_order(5), 3.0, 0.0, None, 0).unwrap();
    assert_eq!(value, 0.0);
    assert_eq!(count, 32.0);

    // a single biased variable halves the count
    let tables = five_var_model(&[1.0, 0.0, 0.0, 0.0, 0.0]);
    let (value, count) =
        solver::min_count(&tables, &full_order(5), 3.0, 0.0, None, 0).unwrap();
    assert_eq!(value, -1.0);
    assert_eq!(count, 16.0);
}

#[test]
fn ising_wrapper_minimizes_the_hamiltonian() {
    let h = [2.0, 1.0, -2.0, 3.0, -4.0];
    let (energies, spins) =
        solver::optimize_ising(&h, &[], &full_order(5), 3.0, 2).unwrap();
    assert_eq!(energies, vec![-12.0, -10.0]);
    assert_eq!(spins[0], vec![-1, -1, 1, -1, 1]);
    assert_eq!(spins[1], vec![-1, 1, 1, -1, 1]);
}

#[test]
fn ising_ferromagnet_ground_states() {
    // two aligned states tie at E = -3 on a triangle
    let j = [(0usize, 1usize, -1.0), (1, 2, -1.0), (0, 2, -1.0)];
    let (energies, spins) =
        solver::optimize_ising(&[0.0; 3], &j, &full_order(3), 3.0, 2).unwrap();
    assert_eq!(energies, vec![-3.0, -3.0]);
    assert_eq!(spins[0], vec![-1, -1, -1]);
    assert_eq!(spins[1], vec![1, 1, 1]);
}

#[test]
fn ising_beta_zero_has_uniform_statistics() {
    let h = [1.0, -2.0, 0.5];
    let j = [(0usize, 1usize, 0.75)];
    let res = solver::sample_ising(&h, &j, &full_order(3), 3.0, 0, 0.0, Some(9), true).unwrap();
    assert!((res.log_pf - 3.0 * 2.0f64.ln()).abs() < 1e-9);
    for m in res.marginals.unwrap() {
        let uniform = if m.vars.len() == 1 { 0.5 } else { 0.25 };
        for &p in &m.values {
            assert!((p - uniform).abs() < 1e-9);
        }
    }
}

#[test]
fn qubo_wrapper_minimizes_the_objective() {
    // x.Q.x with negative diagonal rewards setting bits; coupling penalizes
    // setting both
    let diag = [-1.0, -1.0];
    let off = [(0usize, 1usize, 3.0)];
    let (energies, bits) =
        solver::optimize_qubo(&diag, &off, &full_order(2), 2.0, 4).unwrap();
    assert_eq!(energies, vec![-1.0, -1.0, 0.0, 1.0]);
    assert_eq!(bits[0], vec![0, 1]);
    assert_eq!(bits[1], vec![1, 0]);
    assert_eq!(bits[2], vec![0, 0]);
    assert_eq!(bits[3], vec![1, 1]);
}

#[test]
fn qubo_sampling_matches_the_partition_function() {
    let diag = [1.0];
    let res = solver::sample_qubo(&diag, &[], &full_order(1), 1.0, 0, 2.0, Some(1), false)
        .unwrap();
    // Z = 1 + exp(-2 * 1)
    assert!((res.log_pf - (1.0 + (-2.0f64).exp()).ln()).abs() < 1e-9);
}
