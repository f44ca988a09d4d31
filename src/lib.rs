//! # rsbe: bucket-tree elimination for discrete graphical models
//!
//! `rsbe` performs exact inference over collections of dense factor tables:
//! finding the k lowest-energy configurations, computing log partition
//! functions, drawing exact Boltzmann samples, and extracting single-variable
//! and pairwise marginals. The engine is the classic bucket-elimination /
//! bucket-tree algorithm (Dechter, *Bucket elimination: a unifying framework
//! for reasoning*; see also Chapter 6 of Darwiche's *Modeling and Reasoning
//! with Bayesian Networks*), parameterized by a pluggable algebra so that one
//! two-pass traversal serves min-sum optimization, log-sum-product
//! marginalization, tied-optimum counting, and backward sampling.
//!
//! The main pieces, in dependency order:
//!
//! * [`repr::Table`]: a dense multi-dimensional array indexed by a sorted
//!   variable scope,
//! * [`repr::Graph`]: the primal graph induced by the table scopes,
//! * [`repr::TreeDecomp`]: a rooted bucket forest built from an elimination
//!   order,
//! * [`ops`]: the algebra ("operations"): combine, identity, and a
//!   marginalizer that collapses one variable,
//! * [`Task`] / [`TableMerger`] / [`BucketTree`]: the runtime that executes
//!   the upward λ pass and the optional downward π pass,
//! * [`builder::var_order::greedy_var_order`]: a randomized greedy
//!   elimination-order heuristic honoring a complexity budget,
//! * [`solver`]: table-level entry points plus Ising/QUBO front ends,
//! * [`ffi`]: a C API mirroring the solver layer.
//!
//! ```
//! use rsbe::repr::{Table, VarLabel};
//! use rsbe::solver::{self, Heuristic};
//! use std::sync::Arc;
//!
//! // a two-spin ferromagnet: E(x) = -x0*x1 in the +/-1 convention
//! let t = Table::with_values(
//!     &[VarLabel::new(0), VarLabel::new(1)],
//!     &[2, 2],
//!     vec![-1.0, 1.0, 1.0, -1.0],
//! ).unwrap();
//! let tables = vec![Arc::new(t)];
//!
//! let order = solver::greedy_var_order(
//!     &tables, 2.0, None, Heuristic::MinFill, 1.0, &mut || 0.0).unwrap();
//! let res = solver::optimize(&tables, &order, 2.0, 2, None, 0).unwrap();
//! assert_eq!(res.energies, vec![-1.0, -1.0]); // both aligned states tie
//! ```

use thiserror::Error;

pub mod builder;
pub mod ops;
pub mod repr;

pub mod adapters;
pub mod bucket_tree;
pub mod ffi;
pub mod merger;
pub mod solver;
pub mod task;

pub use bucket_tree::{BucketTree, NodeTables};
pub use merger::TableMerger;
pub use task::Task;

/// Errors shared by every layer of the crate. Entry points convert these to
/// the status-code-plus-message contract of the C API.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: bad scope, zero domain size, out-of-range variable,
    /// repeated elimination-order entry, size mismatch, unknown enum value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A table's logical size exceeds the addressable range.
    #[error("table size exceeds the addressable range")]
    Length,

    /// The tree decomposition induced by the given elimination order is more
    /// complex than the caller's budget allows.
    #[error("tree decomposition complexity is too high ({complexity:.6})")]
    ComplexityExceeded {
        complexity: f64,
        max_complexity: f64,
    },

    /// The requested operation is not supported by this configuration, e.g.
    /// `solve` on a non-solvable bucket tree.
    #[error("operation unavailable: {0}")]
    OperationUnavailable(&'static str),

    /// An allocation failed.
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Error {
        Error::InvalidArgument(msg.into())
    }
}
