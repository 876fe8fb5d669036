//! Adjacency layouts (successor and predecessor lists)
//!
//! Both variants keep every neighbour id in one arena of `edges_count` ids and
//! slice it with an offset table of `nodes_count + 1` entries, so the number
//! of allocations does not grow with the graph.
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! AdjacencyOut:
//!   offsets: [0, 2, 3, 3]
//!   targets: [1, 2, 2]
//!
//! AdjacencyIn:
//!   offsets: [0, 0, 1, 3]
//!   sources: [0, 0, 1]
//! ```
//!
//! Neighbour order within a row follows input order.

use super::edges::{leaves_of, EdgeList};
use super::layout::{LayoutKind, PullRows, SparseLayout};
use crate::error::PageRankError;
use anyhow::Result;
use std::ops::Range;

/// Offset table plus arena, filled by a counting pass
#[derive(Debug, Clone, PartialEq, Eq)]
struct Arena {
    /// Row `r` spans `ids[offsets[r]..offsets[r + 1]]`
    offsets: Vec<usize>,
    ids: Vec<u32>,
}

impl Arena {
    /// Fill rows keyed by `row_of(pair)` with `value_of(pair)`
    ///
    /// The row sizes come from `degrees`; any disagreement between those
    /// counts and the pairs is reported against the row that overflowed or
    /// came up short.
    fn fill(
        degrees: &[u32],
        pairs: &[[u32; 2]],
        row_of: impl Fn(&[u32; 2]) -> u32,
        value_of: impl Fn(&[u32; 2]) -> u32,
    ) -> Result<Self> {
        let mut offsets = Vec::with_capacity(degrees.len() + 1);
        let mut total = 0_usize;
        offsets.push(total);
        for &degree in degrees {
            total += degree as usize;
            offsets.push(total);
        }

        let mut ids = vec![0_u32; total];
        let mut cursor = offsets[..degrees.len()].to_vec();
        for pair in pairs {
            let row = row_of(pair);
            let slot = &mut cursor[row as usize];
            if *slot >= offsets[row as usize + 1] {
                return Err(PageRankError::InconsistentDegree { node: row }.into());
            }
            ids[*slot] = value_of(pair);
            *slot += 1;
        }

        // Rows whose recorded degree exceeds the pairs actually seen
        if let Some(row) = cursor
            .iter()
            .zip(&offsets[1..])
            .position(|(filled, end)| filled != end)
        {
            #[allow(clippy::cast_possible_truncation)] // row < nodes_count <= u32::MAX
            return Err(PageRankError::InconsistentDegree { node: row as u32 }.into());
        }

        Ok(Self { offsets, ids })
    }

    fn row(&self, row: usize) -> &[u32] {
        &self.ids[self.offsets[row]..self.offsets[row + 1]]
    }

    fn rows(&self) -> usize {
        self.offsets.len() - 1
    }
}

/// Successor lists, for push-style sweeps
///
/// # Example
///
/// ```
/// use sparse_pagerank::{AdjacencyOut, EdgeList};
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n0\t2\n1\t2\n").unwrap();
/// let adj = AdjacencyOut::from_edges(&edges).unwrap();
/// assert_eq!(adj.successors(0), &[1, 2]);
/// assert_eq!(adj.successors(2), &[] as &[u32]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyOut {
    arena: Arena,
    leaves: Vec<u32>,
}

impl AdjacencyOut {
    /// Build from an edge list
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InconsistentDegree`] if the out-degrees do not
    /// match the pairs
    pub fn from_edges(edges: &EdgeList) -> Result<Self> {
        let arena = Arena::fill(edges.out_degree(), edges.pairs(), |p| p[0], |p| p[1])?;
        Ok(Self {
            arena,
            leaves: edges.leaves(),
        })
    }

    /// Successors of `node` in input order
    #[must_use]
    pub fn successors(&self, node: usize) -> &[u32] {
        self.arena.row(node)
    }
}

impl SparseLayout for AdjacencyOut {
    fn kind(&self) -> LayoutKind {
        LayoutKind::AdjacencyOut
    }

    fn nodes_count(&self) -> usize {
        self.arena.rows()
    }

    fn edges_count(&self) -> usize {
        self.arena.ids.len()
    }

    fn leaves(&self) -> &[u32] {
        &self.leaves
    }

    #[allow(clippy::cast_precision_loss)]
    fn accumulate(&self, old: &[f32], new: &mut [f32], damping: f32) {
        for (node, &rank) in old.iter().enumerate() {
            let successors = self.successors(node);
            if successors.is_empty() {
                continue;
            }
            let share = damping * rank / successors.len() as f32;
            for &succ in successors {
                new[succ as usize] += share;
            }
        }
    }
}

/// Predecessor lists, for pull-style sweeps
///
/// Every output row depends only on its own predecessors, so rows can be
/// computed independently (see [`PullRows`]).
///
/// # Example
///
/// ```
/// use sparse_pagerank::{AdjacencyIn, EdgeList};
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n0\t2\n1\t2\n").unwrap();
/// let adj = AdjacencyIn::from_edges(&edges).unwrap();
/// assert_eq!(adj.predecessors(2), &[0, 1]);
/// assert_eq!(adj.out_degree(), &[2, 1, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyIn {
    arena: Arena,
    out_degree: Vec<u32>,
    leaves: Vec<u32>,
}

impl AdjacencyIn {
    /// Build from an edge list
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InconsistentDegree`] if the in-degrees do not
    /// match the pairs, or if a stored predecessor has out-degree 0
    pub fn from_edges(edges: &EdgeList) -> Result<Self> {
        let arena = Arena::fill(edges.in_degree(), edges.pairs(), |p| p[1], |p| p[0])?;
        let out_degree = edges.out_degree().to_vec();
        if let Some(&node) = arena.ids.iter().find(|&&u| out_degree[u as usize] == 0) {
            return Err(PageRankError::InconsistentDegree { node }.into());
        }
        Ok(Self {
            arena,
            leaves: leaves_of(&out_degree),
            out_degree,
        })
    }

    /// Predecessors of `node` in input order
    #[must_use]
    pub fn predecessors(&self, node: usize) -> &[u32] {
        self.arena.row(node)
    }

    /// Out-degree of every node (the pull weights)
    #[must_use]
    pub fn out_degree(&self) -> &[u32] {
        &self.out_degree
    }

    /// Self-contained copy of the rows in `rows`
    ///
    /// The partition keeps the full out-degree table because predecessors may
    /// live anywhere in the graph.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is not within `0..nodes_count`
    #[must_use]
    pub fn partition(&self, rows: Range<usize>) -> RowPartition {
        let base = self.arena.offsets[rows.start];
        let offsets = self.arena.offsets[rows.start..=rows.end]
            .iter()
            .map(|offset| offset - base)
            .collect();
        let sources = self.arena.ids[base..self.arena.offsets[rows.end]].to_vec();
        RowPartition {
            first_row: rows.start,
            arena: Arena {
                offsets,
                ids: sources,
            },
            out_degree: self.out_degree.clone(),
            leaves: self.leaves.clone(),
        }
    }
}

/// Sum of `damping * old[u] / out_degree[u]` over `sources`, starting at `seed`
#[allow(clippy::cast_precision_loss)]
#[inline]
fn pull(sources: &[u32], out_degree: &[u32], old: &[f32], damping: f32, seed: f32) -> f32 {
    sources.iter().fold(seed, |acc, &u| {
        let u = u as usize;
        acc + damping * old[u] / out_degree[u] as f32
    })
}

impl SparseLayout for AdjacencyIn {
    fn kind(&self) -> LayoutKind {
        LayoutKind::AdjacencyIn
    }

    fn nodes_count(&self) -> usize {
        self.arena.rows()
    }

    fn edges_count(&self) -> usize {
        self.arena.ids.len()
    }

    fn leaves(&self) -> &[u32] {
        &self.leaves
    }

    fn accumulate(&self, old: &[f32], new: &mut [f32], damping: f32) {
        for (row, slot) in new.iter_mut().enumerate() {
            *slot = self.gather_row(row, old, damping, *slot);
        }
    }
}

impl PullRows for AdjacencyIn {
    fn gather_row(&self, row: usize, old: &[f32], damping: f32, seed: f32) -> f32 {
        pull(self.predecessors(row), &self.out_degree, old, damping, seed)
    }
}

/// A contiguous slice of [`AdjacencyIn`] rows owned by one participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    first_row: usize,
    arena: Arena,
    out_degree: Vec<u32>,
    leaves: Vec<u32>,
}

impl RowPartition {
    /// Global id of the first owned row
    #[must_use]
    pub const fn first_row(&self) -> usize {
        self.first_row
    }

    /// Global row range owned by this partition
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.first_row..self.first_row + self.arena.rows()
    }

    /// Number of nodes in the whole graph
    #[must_use]
    pub fn nodes_count(&self) -> usize {
        self.out_degree.len()
    }

    /// Dangling nodes of the whole graph
    #[must_use]
    pub fn leaves(&self) -> &[u32] {
        &self.leaves
    }

    /// Edges stored in this partition
    #[must_use]
    pub fn edges_count(&self) -> usize {
        self.arena.ids.len()
    }

    /// Predecessors of the `local`-th owned row
    #[must_use]
    pub fn predecessors(&self, local: usize) -> &[u32] {
        self.arena.row(local)
    }

    /// Pull the `local`-th owned row from the full `old` vector
    #[must_use]
    pub fn gather_row(&self, local: usize, old: &[f32], damping: f32, seed: f32) -> f32 {
        pull(self.predecessors(local), &self.out_degree, old, damping, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EdgeList {
        EdgeList::parse("4\t5\n0\t1\n0\t2\n1\t2\n2\t0\n3\t2\n").unwrap()
    }

    #[test]
    fn test_adjacency_out_rows() {
        let adj = AdjacencyOut::from_edges(&sample()).unwrap();
        assert_eq!(adj.nodes_count(), 4);
        assert_eq!(adj.edges_count(), 5);
        assert_eq!(adj.successors(0), &[1, 2]);
        assert_eq!(adj.successors(3), &[2]);
        assert!(adj.leaves().is_empty());
    }

    #[test]
    fn test_adjacency_in_rows() {
        let adj = AdjacencyIn::from_edges(&sample()).unwrap();
        assert_eq!(adj.predecessors(0), &[2]);
        assert_eq!(adj.predecessors(1), &[0]);
        assert_eq!(adj.predecessors(2), &[0, 1, 3]);
        assert_eq!(adj.predecessors(3), &[] as &[u32]);
    }

    #[test]
    fn test_leaves_side_product() {
        let edges = EdgeList::parse("4\t3\n0\t1\n0\t2\n0\t3\n").unwrap();
        let out = AdjacencyOut::from_edges(&edges).unwrap();
        let inn = AdjacencyIn::from_edges(&edges).unwrap();
        assert_eq!(out.leaves(), &[1, 2, 3]);
        assert_eq!(inn.leaves(), &[1, 2, 3]);
    }

    #[test]
    fn test_inconsistent_degree_detected() {
        // out_degree claims node 1 has no successors, but it has one
        let edges =
            EdgeList::from_raw_parts(3, vec![[0, 1], [1, 2]], vec![2, 0, 0], vec![0, 1, 1])
                .unwrap();
        let err = AdjacencyOut::from_edges(&edges).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PageRankError>(),
            Some(PageRankError::InconsistentDegree { .. })
        ));

        // in-degrees agree but a stored predecessor has out-degree 0
        let edges =
            EdgeList::from_raw_parts(3, vec![[0, 1], [1, 2]], vec![1, 0, 0], vec![0, 1, 1])
                .unwrap();
        let err = AdjacencyIn::from_edges(&edges).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PageRankError>(),
            Some(PageRankError::InconsistentDegree { node: 1 })
        ));
    }

    #[test]
    fn test_push_and_pull_agree() {
        let edges = sample();
        let out = AdjacencyOut::from_edges(&edges).unwrap();
        let inn = AdjacencyIn::from_edges(&edges).unwrap();
        let old = vec![0.1, 0.2, 0.3, 0.4];

        let mut pushed = vec![0.0; 4];
        out.accumulate(&old, &mut pushed, 0.85);
        let mut pulled = vec![0.0; 4];
        inn.accumulate(&old, &mut pulled, 0.85);

        for (a, b) in pushed.iter().zip(&pulled) {
            assert!((a - b).abs() < 1e-6, "{pushed:?} vs {pulled:?}");
        }
        // node 2 gets half of node 0, all of node 1 and all of node 3
        assert!((pulled[2] - 0.85 * (0.05 + 0.2 + 0.4)).abs() < 1e-6);
    }

    #[test]
    fn test_partition_rebases_offsets() {
        let adj = AdjacencyIn::from_edges(&sample()).unwrap();
        let part = adj.partition(2..4);

        assert_eq!(part.first_row(), 2);
        assert_eq!(part.rows(), 2..4);
        assert_eq!(part.nodes_count(), 4);
        assert_eq!(part.edges_count(), 3);
        assert_eq!(part.predecessors(0), &[0, 1, 3]);
        assert_eq!(part.predecessors(1), &[] as &[u32]);

        let old = vec![0.25; 4];
        assert_eq!(
            part.gather_row(0, &old, 0.85, 0.1),
            adj.gather_row(2, &old, 0.85, 0.1)
        );
    }

    #[test]
    fn test_empty_partition() {
        let adj = AdjacencyIn::from_edges(&sample()).unwrap();
        let part = adj.partition(4..4);
        assert_eq!(part.rows(), 4..4);
        assert_eq!(part.edges_count(), 0);
    }
}
