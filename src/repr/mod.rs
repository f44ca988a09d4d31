//! Core data representations: variable labels, factor tables, the primal
//! graph, tree decompositions, and bounded solution sets.

pub mod graph;
pub mod solution;
pub mod table;
pub mod tree_decomp;
pub mod var_label;

pub use graph::Graph;
pub use solution::{Maximize, MinSolution, MinSolutionSet, Minimize, ValueOrder};
pub use table::{Table, TableVar};
pub use tree_decomp::{TreeDecomp, TreeDecompNode};
pub use var_label::{DomIndex, VarLabel};
