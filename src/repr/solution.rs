//! Bounded ordered sets of (value, assignment) pairs for k-best searches.

use crate::repr::DomIndex;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Strict ordering of solution values. `Minimize` keeps the k smallest
/// values (k-min), `Maximize` the k largest (k-max).
pub trait ValueOrder<V>: Clone + Debug + Default {
    /// True when `a` is strictly better than `b`.
    fn precedes(a: &V, b: &V) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Minimize;

impl<V: PartialOrd> ValueOrder<V> for Minimize {
    fn precedes(a: &V, b: &V) -> bool {
        a < b
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Maximize;

impl<V: PartialOrd> ValueOrder<V> for Maximize {
    fn precedes(a: &V, b: &V) -> bool {
        a > b
    }
}

/// One candidate solution: an objective value offset and a full assignment
/// vector indexed by variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MinSolution<V> {
    pub value: V,
    pub solution: Vec<DomIndex>,
}

/// A capacity-bounded set of solutions ordered by value (under the
/// comparator `C`) and, within equal values, lexicographically by the
/// assignment vector. Inserting into a full set replaces the worst element
/// only when the newcomer orders strictly before it; exact duplicates are
/// ignored.
///
/// ```
/// use rsbe::repr::{MinSolutionSet, Minimize};
///
/// let mut set: MinSolutionSet<i32, Minimize> = MinSolutionSet::new(2);
/// set.insert(5, vec![1, 0]);
/// set.insert(3, vec![0, 0]);
/// set.insert(4, vec![0, 1]); // evicts the 5
/// assert_eq!(set.solutions().len(), 2);
/// assert_eq!(set.solutions()[0].value, 3);
/// assert_eq!(set.solutions()[1].value, 4);
/// ```
#[derive(Debug, Clone)]
pub struct MinSolutionSet<V, C> {
    capacity: usize,
    solutions: Vec<MinSolution<V>>,
    order: PhantomData<C>,
}

impl<V, C> MinSolutionSet<V, C>
where
    C: ValueOrder<V>,
{
    pub fn new(capacity: usize) -> MinSolutionSet<V, C> {
        MinSolutionSet {
            capacity,
            solutions: Vec::with_capacity(capacity.min(1024)),
            order: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Solutions in order, best first.
    pub fn solutions(&self) -> &[MinSolution<V>] {
        &self.solutions
    }

    /// Drain the set, leaving it empty with the same capacity.
    pub fn take_solutions(&mut self) -> Vec<MinSolution<V>> {
        std::mem::take(&mut self.solutions)
    }

    fn rank(a: &MinSolution<V>, b: &MinSolution<V>) -> Ordering {
        if C::precedes(&a.value, &b.value) {
            Ordering::Less
        } else if C::precedes(&b.value, &a.value) {
            Ordering::Greater
        } else {
            a.solution.cmp(&b.solution)
        }
    }

    /// Insert a candidate; returns false when the candidate was rejected
    /// (set full and not better than the current worst, or an exact
    /// duplicate). A false return means every later candidate that orders
    /// after this one is also rejectable.
    pub fn insert(&mut self, value: V, solution: Vec<DomIndex>) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let cand = MinSolution { value, solution };
        let pos = match self
            .solutions
            .binary_search_by(|probe| Self::rank(probe, &cand))
        {
            Ok(_) => return false, // exact duplicate
            Err(pos) => pos,
        };
        if self.solutions.len() == self.capacity {
            if pos == self.capacity {
                return false;
            }
            self.solutions.pop();
        }
        self.solutions.insert(pos, cand);
        true
    }
}
