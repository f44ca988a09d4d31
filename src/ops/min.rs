//! Min-plus operations: optimization and k-best solution recovery.

use crate::ops::{build_step_sizes, context_index, Combine, Marginalizer, Operations, SolvableMarginalizer};
use crate::repr::{DomIndex, MinSolutionSet, Minimize, Table, ValueOrder, VarLabel};
use crate::Result;
use std::cell::Cell;
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Min-plus (or max-plus, with [`crate::repr::Maximize`]) operations.
/// Tables combine by pointwise addition; marginalization keeps the
/// comparator-best value. `max_solutions` bounds the solution sets built by
/// [`Operations::init_solution`] and may be adjusted between constructing a
/// bucket tree and solving it.
#[derive(Debug)]
pub struct MinOperations<V, C = Minimize> {
    max_solutions: Cell<usize>,
    order: PhantomData<(V, C)>,
}

impl<V, C> MinOperations<V, C> {
    pub fn new(max_solutions: usize) -> MinOperations<V, C> {
        MinOperations {
            max_solutions: Cell::new(max_solutions),
            order: PhantomData,
        }
    }

    pub fn max_solutions(&self) -> usize {
        self.max_solutions.get()
    }

    pub fn set_max_solutions(&self, max_solutions: usize) {
        self.max_solutions.set(max_solutions);
    }
}

impl<V, C> Default for MinOperations<V, C> {
    fn default() -> Self {
        MinOperations::new(1)
    }
}

impl<V, C> Operations for MinOperations<V, C>
where
    V: Combine + PartialOrd + 'static,
    C: ValueOrder<V> + 'static,
{
    type Value = V;
    type Solution = MinSolutionSet<V, C>;

    fn marginalizer(&self) -> Result<Box<dyn Marginalizer<V>>> {
        Ok(Box::new(MinMarginalizer::<C>(PhantomData)))
    }

    fn solvable_marginalizer(
        &self,
        sep_vars: &[VarLabel],
        sep_dom_sizes: &[usize],
        elim_var: VarLabel,
        _elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<V, MinSolutionSet<V, C>>>> {
        let (steps, num_contexts) = build_step_sizes(sep_vars, sep_dom_sizes)?;
        Ok(Box::new(SolvableMinMarginalizer {
            steps,
            elim_var,
            contexts: vec![Vec::new(); num_contexts],
            order: PhantomData,
        }))
    }

    fn init_solution(&self, x0: &[DomIndex]) -> Result<MinSolutionSet<V, C>> {
        let mut set = MinSolutionSet::new(self.max_solutions.get());
        set.insert(V::identity(), x0.to_vec());
        Ok(set)
    }
}

/// Plain comparator-minimum over a unary slice.
pub struct MinMarginalizer<C>(PhantomData<C>);

impl<V, C> Marginalizer<V> for MinMarginalizer<C>
where
    V: Combine + PartialOrd,
    C: ValueOrder<V>,
{
    fn marginalize(&mut self, _out_index: usize, table: &Table<V>) -> V {
        best_value::<V, C>(table.values())
    }
}

fn best_value<V: Copy, C: ValueOrder<V>>(values: &[V]) -> V {
    let mut best = values[0];
    for &v in &values[1..] {
        if C::precedes(&v, &best) {
            best = v;
        }
    }
    best
}

/// The k-best form: for every separator context it records all
/// `(value, domain index)` candidates sorted best-first, so the downward
/// pass can expand each held solution into every way of extending it.
pub struct SolvableMinMarginalizer<V, C> {
    steps: Vec<(VarLabel, usize)>,
    elim_var: VarLabel,
    /// candidates per separator context, sorted by (comparator, index)
    contexts: Vec<Vec<(V, DomIndex)>>,
    order: PhantomData<C>,
}

impl<V, C> Marginalizer<V> for SolvableMinMarginalizer<V, C>
where
    V: Combine + PartialOrd,
    C: ValueOrder<V>,
{
    fn marginalize(&mut self, out_index: usize, table: &Table<V>) -> V {
        let mut candidates: Vec<(V, DomIndex)> = table
            .values()
            .iter()
            .copied()
            .enumerate()
            .map(|(i, v)| (v, i))
            .collect();
        candidates.sort_by(|a, b| {
            if C::precedes(&a.0, &b.0) {
                Ordering::Less
            } else if C::precedes(&b.0, &a.0) {
                Ordering::Greater
            } else {
                a.1.cmp(&b.1)
            }
        });
        let best = candidates[0].0;
        self.contexts[out_index] = candidates;
        best
    }
}

impl<V, C> SolvableMarginalizer<V, MinSolutionSet<V, C>> for SolvableMinMarginalizer<V, C>
where
    V: Combine + PartialOrd,
    C: ValueOrder<V>,
{
    fn solve(&self, solution: &mut MinSolutionSet<V, C>) {
        let elim = self.elim_var.value_usize();
        let held = solution.take_solutions();
        for sol in held {
            let ctx = context_index(&self.steps, &sol.solution);
            let candidates = &self.contexts[ctx];
            debug_assert!(!candidates.is_empty(), "context never marginalized");
            let best = candidates[0].0;
            for &(v, idx) in candidates {
                let value = sol.value.combine(v.combine_inverse(best));
                let mut assignment = sol.solution.clone();
                assignment[elim] = idx;
                if !solution.insert(value, assignment) {
                    // candidates are sorted, nothing later can land either
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{Maximize, MinSolution};

    fn unary_table(values: Vec<i32>) -> Table<i32> {
        Table::with_values(&[VarLabel::new(7)], &[values.len()], values).unwrap()
    }

    fn set_of<C: ValueOrder<i32> + 'static>(
        capacity: usize,
        entries: &[(i32, Vec<usize>)],
    ) -> MinSolutionSet<i32, C> {
        let mut set = MinSolutionSet::new(capacity);
        for (v, s) in entries {
            set.insert(*v, s.clone());
        }
        set
    }

    fn check_eq<C: ValueOrder<i32> + 'static>(
        got: &MinSolutionSet<i32, C>,
        expected: &[(i32, Vec<usize>)],
    ) {
        let got: Vec<(i32, Vec<usize>)> = got
            .solutions()
            .iter()
            .map(|MinSolution { value, solution }| (*value, solution.clone()))
            .collect();
        assert_eq!(got, expected);
    }

    const VALUES: [i32; 8] = [-2, 5, 1, -3, -4, -1, -2, 6];

    fn solvable<C: ValueOrder<i32> + 'static>(
    ) -> Box<dyn SolvableMarginalizer<i32, MinSolutionSet<i32, C>>> {
        let ops: MinOperations<i32, C> = MinOperations::new(1);
        ops.solvable_marginalizer(
            &[VarLabel::new(1), VarLabel::new(4)],
            &[3, 2],
            VarLabel::new(7),
            8,
        )
        .unwrap()
    }

    #[test]
    fn plain_marginalizer() {
        let ops: MinOperations<i32> = MinOperations::new(1);
        let mut mrg = ops.marginalizer().unwrap();
        assert_eq!(mrg.marginalize(4, &unary_table(VALUES.to_vec())), -4);
    }

    #[test]
    fn solvable_hits_capacity() {
        let mut mrg = solvable::<Minimize>();
        assert_eq!(mrg.marginalize(4, &unary_table(VALUES.to_vec())), -4);

        // context vars 1 and 4 are both 1 -> context index 1 + 3 = 4
        let mut sols = set_of::<Minimize>(
            3,
            &[
                (100, vec![9, 1, 9, 9, 1, 9, 9, 9, 9, 9]),
                (101, vec![8, 1, 8, 8, 1, 8, 8, 8, 8, 8]),
            ],
        );
        mrg.solve(&mut sols);
        check_eq(
            &sols,
            &[
                (100, vec![9, 1, 9, 9, 1, 9, 9, 4, 9, 9]),
                (101, vec![8, 1, 8, 8, 1, 8, 8, 4, 8, 8]),
                (101, vec![9, 1, 9, 9, 1, 9, 9, 3, 9, 9]),
            ],
        );
    }

    #[test]
    fn solvable_expands_fully_below_capacity() {
        let mut mrg = solvable::<Minimize>();
        assert_eq!(mrg.marginalize(4, &unary_table(VALUES.to_vec())), -4);

        let mut sols = set_of::<Minimize>(10, &[(200, vec![9, 1, 9, 9, 1, 9, 9, 9, 9, 9])]);
        mrg.solve(&mut sols);
        check_eq(
            &sols,
            &[
                (200, vec![9, 1, 9, 9, 1, 9, 9, 4, 9, 9]),
                (201, vec![9, 1, 9, 9, 1, 9, 9, 3, 9, 9]),
                (202, vec![9, 1, 9, 9, 1, 9, 9, 0, 9, 9]),
                (202, vec![9, 1, 9, 9, 1, 9, 9, 6, 9, 9]),
                (203, vec![9, 1, 9, 9, 1, 9, 9, 5, 9, 9]),
                (205, vec![9, 1, 9, 9, 1, 9, 9, 2, 9, 9]),
                (209, vec![9, 1, 9, 9, 1, 9, 9, 1, 9, 9]),
                (210, vec![9, 1, 9, 9, 1, 9, 9, 7, 9, 9]),
            ],
        );
    }

    #[test]
    fn solvable_with_max_comparator() {
        let mut mrg = solvable::<Maximize>();
        assert_eq!(mrg.marginalize(4, &unary_table(VALUES.to_vec())), 6);

        let mut sols = set_of::<Maximize>(5, &[(300, vec![9, 1, 9, 9, 1, 9, 9, 9, 9, 9])]);
        mrg.solve(&mut sols);
        check_eq(
            &sols,
            &[
                (300, vec![9, 1, 9, 9, 1, 9, 9, 7, 9, 9]),
                (299, vec![9, 1, 9, 9, 1, 9, 9, 1, 9, 9]),
                (295, vec![9, 1, 9, 9, 1, 9, 9, 2, 9, 9]),
                (293, vec![9, 1, 9, 9, 1, 9, 9, 5, 9, 9]),
                (292, vec![9, 1, 9, 9, 1, 9, 9, 0, 9, 9]),
            ],
        );
    }
}
