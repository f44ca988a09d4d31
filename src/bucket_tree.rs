//! The two-pass bucket-tree runtime.
//!
//! The upward pass walks each root's subtree in postorder. A node collects
//! its base tables (input tables whose bucket this is, clamped coordinates
//! already fixed) and the λ messages of its children, merges them onto its
//! separator while eliminating the node variable, and sends the result up as
//! its own λ. At a root the separator is empty, so the merge leaves a
//! scalar; combining the root scalars with the fully-clamped tables yields
//! the problem value: the optimum under min-plus, the log partition
//! function under log-sum-product, an ⟨optimum, count⟩ pair under count-min.
//!
//! Two optional downward facilities build on the same traversal:
//!
//! * *solvable* trees keep each node's solvable marginalizer; `solve` runs
//!   them in preorder, extending a partial assignment root-to-leaf (argmin
//!   expansion for k-best, conditional draws for sampling),
//! * *node tables* retain every bucket's table list and add the π message
//!   merged down from its parent, which is exactly what marginal extraction
//!   needs.
//!
//! Traversals are explicit-stack loops, so deep, path-like decompositions
//! cannot overflow the call stack.

use crate::ops::{Operations, SolvableMarginalizer};
use crate::repr::{DomIndex, Table, TreeDecomp, VarLabel};
use crate::{Error, Result, TableMerger, Task};
use std::sync::Arc;

/// One bucket's retained tables: base tables, child λ messages, and (for
/// non-roots) the π message from the parent.
pub struct NodeTables<V> {
    pub node_var: VarLabel,
    pub sep_vars: Vec<VarLabel>,
    pub tables: Vec<Arc<Table<V>>>,
}

pub struct BucketTree<'a, O: Operations> {
    task: &'a Task<O>,
    x0: Vec<DomIndex>,
    problem_value: O::Value,
    /// per-node solvable marginalizers in preorder; empty unless solvable
    solvers: Vec<Box<dyn SolvableMarginalizer<O::Value, O::Solution>>>,
    solvable: bool,
    node_tables: Option<Vec<NodeTables<O::Value>>>,
}

impl<'a, O: Operations> BucketTree<'a, O> {
    /// Run the upward pass (and, when `keep_node_tables`, the downward π
    /// pass) over `decomp`. `x0` supplies the values of clamped variables;
    /// its other entries are ignored.
    pub fn new(
        task: &'a Task<O>,
        decomp: &TreeDecomp,
        x0: Vec<DomIndex>,
        solvable: bool,
        keep_node_tables: bool,
    ) -> Result<BucketTree<'a, O>> {
        if x0.len() != task.num_vars() {
            return Err(Error::invalid(format!(
                "initial state has {} entries but the task has {} variables",
                x0.len(),
                task.num_vars()
            )));
        }
        for (v, &a) in x0.iter().enumerate() {
            let dom = task.dom_size(VarLabel::new_usize(v));
            if a >= dom {
                return Err(Error::invalid(format!(
                    "initial state entry {} is {} but the domain size is {}",
                    v, a, dom
                )));
            }
        }

        let merger = TableMerger::new(task);
        let postorder = decomp.postorder();
        let preorder = decomp.preorder();

        let mut lambda: Vec<Option<Arc<Table<O::Value>>>> =
            (0..decomp.size()).map(|_| None).collect();
        let mut bucket_tables: Vec<Vec<Arc<Table<O::Value>>>> =
            (0..decomp.size()).map(|_| Vec::new()).collect();
        let mut solvers_by_node: Vec<Option<Box<dyn SolvableMarginalizer<O::Value, O::Solution>>>> =
            (0..decomp.size()).map(|_| None).collect();
        let mut root_values = Vec::new();

        for &n in &postorder {
            let node = decomp.node(n);
            let mut tables = task.base_tables(node, &x0);
            for &c in node.children() {
                tables.push(Arc::clone(
                    lambda[c].as_ref().expect("postorder visits children first"),
                ));
            }

            let sep = node.sep_vars();
            let sep_doms: Vec<usize> = sep.iter().map(|&v| task.dom_size(v)).collect();
            let message = if solvable {
                let mut solver = task.solvable_marginalizer(
                    sep,
                    &sep_doms,
                    node.node_var(),
                    task.dom_size(node.node_var()),
                )?;
                let message = merger.merge(sep, &tables, solver.as_mut())?;
                solvers_by_node[n] = Some(solver);
                message
            } else {
                let mut mrg = task.marginalizer()?;
                merger.merge(sep, &tables, mrg.as_mut())?
            };

            if node.parent().is_none() {
                root_values.push(message[0]);
            } else {
                lambda[n] = Some(Arc::new(message));
            }
            if keep_node_tables {
                bucket_tables[n] = tables;
            }
        }

        let problem_value = task.problem_value(&root_values, &x0, decomp.clamped_vars());

        let node_tables = if keep_node_tables {
            // π pass: parents push their remaining tables down before their
            // children are visited, so every non-root sees a complete list
            for &n in &preorder {
                let node = decomp.node(n);
                for &c in node.children() {
                    let child_lambda = lambda[c].as_ref().expect("non-root child has a message");
                    let remaining: Vec<Arc<Table<O::Value>>> = bucket_tables[n]
                        .iter()
                        .filter(|t| !Arc::ptr_eq(t, child_lambda))
                        .cloned()
                        .collect();
                    let mut mrg = task.marginalizer()?;
                    let pi = merger.merge(decomp.node(c).sep_vars(), &remaining, mrg.as_mut())?;
                    bucket_tables[c].push(Arc::new(pi));
                }
            }
            let mut out = Vec::with_capacity(decomp.size());
            for (n, tables) in bucket_tables.into_iter().enumerate() {
                let node = decomp.node(n);
                out.push(NodeTables {
                    node_var: node.node_var(),
                    sep_vars: node.sep_vars().to_vec(),
                    tables,
                });
            }
            Some(out)
        } else {
            None
        };

        let solvers = preorder
            .iter()
            .filter_map(|&n| solvers_by_node[n].take())
            .collect();

        Ok(BucketTree {
            task,
            x0,
            problem_value,
            solvers,
            solvable,
            node_tables,
        })
    }

    pub fn task(&self) -> &Task<O> {
        self.task
    }

    /// The scalar result of the upward pass.
    pub fn problem_value(&self) -> O::Value {
        self.problem_value
    }

    /// Run the downward pass, producing a solution (k-best set, sample, ...
    /// depending on the algebra). Repeated calls are independent; in
    /// sampling mode each call consumes fresh random draws.
    pub fn solve(&self) -> Result<O::Solution> {
        if !self.solvable {
            return Err(Error::OperationUnavailable(
                "bucket tree was built without solve support",
            ));
        }
        let mut solution = self.task.init_solution(&self.x0)?;
        for solver in &self.solvers {
            solver.solve(&mut solution);
        }
        Ok(solution)
    }

    /// The retained per-bucket tables, in elimination order.
    pub fn node_tables(&self) -> Result<&[NodeTables<O::Value>]> {
        self.node_tables
            .as_deref()
            .ok_or(Error::OperationUnavailable(
                "bucket tree was built without node tables",
            ))
    }
}
