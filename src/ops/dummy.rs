//! A value-free operations bundle for building elimination orders.
//!
//! The greedy ordering heuristic only inspects scopes, domain sizes, and the
//! primal graph, never table values. Pairing a [`crate::Task`] with
//! `DummyOperations` makes the value type `()`, so even huge tables cost no
//! memory beyond their scope metadata.

use crate::ops::{Marginalizer, Operations, SolvableMarginalizer};
use crate::repr::{DomIndex, VarLabel};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyOperations;

impl Operations for DummyOperations {
    type Value = ();
    type Solution = ();

    fn marginalizer(&self) -> Result<Box<dyn Marginalizer<()>>> {
        Err(Error::OperationUnavailable(
            "dummy operations cannot marginalize",
        ))
    }

    fn solvable_marginalizer(
        &self,
        _sep_vars: &[VarLabel],
        _sep_dom_sizes: &[usize],
        _elim_var: VarLabel,
        _elim_dom_size: usize,
    ) -> Result<Box<dyn SolvableMarginalizer<(), ()>>> {
        Err(Error::OperationUnavailable(
            "dummy operations cannot marginalize",
        ))
    }

    fn init_solution(&self, _x0: &[DomIndex]) -> Result<()> {
        Err(Error::OperationUnavailable(
            "dummy operations cannot solve",
        ))
    }
}
