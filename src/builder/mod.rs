//! Algorithms that prepare a problem for the bucket-tree runtime.

pub mod var_order;

pub use var_order::{greedy_var_order, Heuristic};
