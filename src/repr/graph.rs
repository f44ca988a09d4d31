//! Symmetric adjacency of the primal graph induced by factor scopes.
//!
//! Two variables are adjacent iff some input table mentions both. Storage is
//! a flat CSR pair (`offsets`, `neighbours`) with each row ascending, so
//! neighbourhood scans are cache-friendly during elimination.

use crate::repr::VarLabel;
use std::collections::BTreeSet;

/// Compressed sparse-row adjacency over variables `0..num_vertices`.
///
/// ```
/// use rsbe::repr::{Graph, VarLabel};
///
/// let g = Graph::from_edges(
///     [(0, 1), (2, 0), (1, 3)].map(|(a, b)| (VarLabel::new(a), VarLabel::new(b))),
///     0,
/// );
/// assert_eq!(g.num_vertices(), 4);
/// assert_eq!(g.degree(VarLabel::new(0)), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    offsets: Vec<usize>,
    neighbours: Vec<VarLabel>,
}

impl Default for Graph {
    fn default() -> Graph {
        Graph {
            offsets: vec![0],
            neighbours: Vec::new(),
        }
    }
}

impl Graph {
    /// Build from endpoint pairs. Self-loops are dropped, duplicates
    /// coalesce, and both directions are stored. `min_vertices` floors the
    /// vertex count for graphs with trailing isolated variables.
    pub fn from_edges<I>(edges: I, min_vertices: usize) -> Graph
    where
        I: IntoIterator<Item = (VarLabel, VarLabel)>,
    {
        let mut sym: BTreeSet<(usize, usize)> = BTreeSet::new();
        let mut num_vertices = min_vertices;
        for (a, b) in edges {
            let (a, b) = (a.value_usize(), b.value_usize());
            num_vertices = num_vertices.max(a.max(b) + 1);
            if a != b {
                sym.insert((a, b));
                sym.insert((b, a));
            }
        }

        let mut offsets = Vec::with_capacity(num_vertices + 1);
        let mut neighbours = Vec::with_capacity(sym.len());
        offsets.push(0);
        let mut last = 0;
        for (a, b) in sym {
            while last <= a {
                last += 1;
                offsets.push(neighbours.len());
            }
            neighbours.push(VarLabel::new_usize(b));
            *offsets.last_mut().unwrap() = neighbours.len();
        }
        offsets.resize(num_vertices + 1, neighbours.len());

        Graph {
            offsets,
            neighbours,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn degree(&self, v: VarLabel) -> usize {
        let v = v.value_usize();
        self.offsets[v + 1] - self.offsets[v]
    }

    /// The neighbours of `v`, ascending.
    pub fn neighbours(&self, v: VarLabel) -> &[VarLabel] {
        let v = v.value_usize();
        &self.neighbours[self.offsets[v]..self.offsets[v + 1]]
    }
}
