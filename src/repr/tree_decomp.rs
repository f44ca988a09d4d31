//! Tree decompositions (bucket forests) built from an elimination order.
//!
//! Eliminating the variables of a graph in a fixed order yields one bucket
//! node per eliminated variable: the node's separator is the set of
//! still-uneliminated neighbours at elimination time (after fill-in), and its
//! parent is the earliest-eliminated separator variable's node. Variables
//! absent from the order are *clamped*: they are removed from every
//! neighbourhood up front and recorded on the nodes they touch. The result
//! is a rooted forest, with more than one root when the graph is disconnected or
//! clamping severs it. See Dechter, *Bucket elimination: a unifying
//! framework for reasoning*.
//!
//! Nodes live in a single arena owned by the decomposition; parent and child
//! links are arena indices, so no reference cycles arise.

use crate::repr::{Graph, VarLabel};
use crate::{Error, Result};
use bit_set::BitSet;
use std::collections::BTreeSet;

/// One bucket of the decomposition: the variable eliminated here, the
/// separator surviving the elimination, and the clamped variables adjacent
/// to this bucket's variable in the original graph.
#[derive(Debug, Clone)]
pub struct TreeDecompNode {
    node_var: VarLabel,
    sep_vars: Vec<VarLabel>,
    clamped_vars: Vec<VarLabel>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl TreeDecompNode {
    pub fn node_var(&self) -> VarLabel {
        self.node_var
    }

    /// Separator variables, strictly ascending; never contains `node_var`.
    pub fn sep_vars(&self) -> &[VarLabel] {
        &self.sep_vars
    }

    /// Clamped variables attached to this node, strictly ascending.
    pub fn clamped_vars(&self) -> &[VarLabel] {
        &self.clamped_vars
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Child node indices into the owning arena.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// A free-standing node, useful for driving `Task::base_tables`
    /// directly; `sep_vars`/`clamped_vars` can be filled afterwards.
    pub fn detached(node_var: VarLabel) -> TreeDecompNode {
        TreeDecompNode {
            node_var,
            sep_vars: Vec::new(),
            clamped_vars: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn set_sep_vars(&mut self, sep_vars: Vec<VarLabel>) {
        self.sep_vars = sep_vars;
    }

    pub fn set_clamped_vars(&mut self, clamped_vars: Vec<VarLabel>) {
        self.clamped_vars = clamped_vars;
    }
}

/// A rooted bucket forest over the variables of a [`Graph`].
#[derive(Debug, Clone)]
pub struct TreeDecomp {
    nodes: Vec<TreeDecompNode>,
    roots: Vec<usize>,
    clamped_vars: Vec<VarLabel>,
    complexity: f64,
    num_vars: usize,
}

impl TreeDecomp {
    /// Build the decomposition of `graph` for the elimination order
    /// `var_order`. Variables missing from the order are clamped.
    ///
    /// Fails with [`Error::InvalidArgument`] when the order repeats a
    /// variable or references one outside the graph, or when `dom_sizes` is
    /// shorter than the variable count or contains a zero.
    pub fn new(graph: &Graph, var_order: &[VarLabel], dom_sizes: &[usize]) -> Result<TreeDecomp> {
        let num_vars = graph.num_vertices();
        if dom_sizes.len() < num_vars {
            return Err(Error::invalid(format!(
                "domain-size vector has {} entries but the graph has {} variables",
                dom_sizes.len(),
                num_vars
            )));
        }
        if let Some(v) = dom_sizes[..num_vars].iter().position(|&d| d == 0) {
            return Err(Error::invalid(format!("variable {} has domain size 0", v)));
        }

        // position[v] = elimination step of v, if v is in the order
        let mut position: Vec<Option<usize>> = vec![None; num_vars];
        for (i, &v) in var_order.iter().enumerate() {
            let vi = v.value_usize();
            if vi >= num_vars {
                return Err(Error::invalid(format!(
                    "elimination order contains {} but there are only {} variables",
                    v, num_vars
                )));
            }
            if position[vi].is_some() {
                return Err(Error::invalid(format!(
                    "variable {} appears more than once in the elimination order",
                    v
                )));
            }
            position[vi] = Some(i);
        }

        let mut clamped_mask = BitSet::with_capacity(num_vars);
        let mut clamped_vars = Vec::new();
        for v in 0..num_vars {
            if position[v].is_none() {
                clamped_mask.insert(v);
                clamped_vars.push(VarLabel::new_usize(v));
            }
        }

        // working adjacency over unclamped variables only; fill edges are
        // added as elimination proceeds
        let mut adj: Vec<BTreeSet<usize>> = (0..num_vars)
            .map(|v| {
                if clamped_mask.contains(v) {
                    BTreeSet::new()
                } else {
                    graph
                        .neighbours(VarLabel::new_usize(v))
                        .iter()
                        .map(|w| w.value_usize())
                        .filter(|&w| !clamped_mask.contains(w))
                        .collect()
                }
            })
            .collect();

        let mut nodes: Vec<TreeDecompNode> = Vec::with_capacity(var_order.len());
        let mut roots = Vec::new();
        let mut complexity = 0.0f64;

        for &v in var_order {
            let vi = v.value_usize();
            let neighbours: Vec<usize> = adj[vi].iter().copied().collect();

            // fill in a clique among the remaining neighbours
            for &u in &neighbours {
                adj[u].remove(&vi);
                for &w in &neighbours {
                    if w != u {
                        adj[u].insert(w);
                    }
                }
            }

            let parent = neighbours
                .iter()
                .copied()
                .min_by_key(|&u| position[u].expect("unclamped neighbour is in the order"));

            let node_complexity = (dom_sizes[vi] as f64).log2()
                + neighbours
                    .iter()
                    .map(|&u| (dom_sizes[u] as f64).log2())
                    .sum::<f64>();
            complexity = complexity.max(node_complexity);

            let clamped_here: Vec<VarLabel> = graph
                .neighbours(v)
                .iter()
                .copied()
                .filter(|w| clamped_mask.contains(w.value_usize()))
                .collect();

            let idx = nodes.len();
            nodes.push(TreeDecompNode {
                node_var: v,
                sep_vars: neighbours.iter().map(|&u| VarLabel::new_usize(u)).collect(),
                clamped_vars: clamped_here,
                parent: parent.map(|u| position[u].unwrap()),
                children: Vec::new(),
            });
            if parent.is_none() {
                roots.push(idx);
            }
        }

        for i in 0..nodes.len() {
            if let Some(p) = nodes[i].parent {
                nodes[p].children.push(i);
            }
        }
        // roots and children are visited latest-eliminated first
        roots.reverse();
        for n in nodes.iter_mut() {
            n.children.reverse();
        }

        Ok(TreeDecomp {
            nodes,
            roots,
            clamped_vars,
            complexity,
            num_vars,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Number of bucket nodes, i.e. the elimination-order length.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, idx: usize) -> &TreeDecompNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[TreeDecompNode] {
        &self.nodes
    }

    /// Arena indices of the roots.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// All clamped variables, strictly ascending.
    pub fn clamped_vars(&self) -> &[VarLabel] {
        &self.clamped_vars
    }

    /// log2 of the largest node scope's assignment count; for binary
    /// variables this is the treewidth plus one.
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    /// Arena indices in preorder: every node before its children, roots in
    /// their stored order.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.nodes[i].children.iter().rev());
        }
        order
    }

    /// Arena indices in postorder: every node after its children.
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, children emitted yet?)
        let mut stack: Vec<(usize, bool)> = self.roots.iter().rev().map(|&r| (r, false)).collect();
        while let Some((i, expanded)) = stack.pop() {
            if expanded {
                order.push(i);
            } else {
                stack.push((i, true));
                stack.extend(self.nodes[i].children.iter().rev().map(|&c| (c, false)));
            }
        }
        order
    }
}
