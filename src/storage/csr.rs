//! CSR (Compressed Sparse Row) transition matrix
//!
//! Based on `GraphBLAST` (Yang et al., ACM `ToMS` 2022) for GPU-optimized sparse matrix operations.
//!
//! Row `i` holds the contributions flowing **into** node `i`: column `j` is a
//! predecessor and the stored value is `1 / out_degree[j]`, so the matrix is
//! column-stochastic over non-dangling columns.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! CSR:
//!   row_offsets: [0, 0, 1, 3]      // Row 0: no predecessors, row 1: [0..1), row 2: [1..3)
//!   col_indices: [0, 0, 1]
//!   values:      [0.5, 0.5, 1.0]
//! ```

use super::edges::EdgeList;
use super::layout::{LayoutKind, PullRows, SparseLayout};
use crate::error::PageRankError;
use anyhow::{Context, Result};

/// Column-stochastic CSR matrix
///
/// Optimized for:
/// - One linear pass after a parallel sort of the edges by head
/// - Independent rows (pull-style, write-disjoint)
/// - GPU-friendly memory layout (`u32` offsets and indices, `f32` values)
///
/// # Example
///
/// ```
/// use sparse_pagerank::{CsrMatrix, EdgeList};
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n0\t2\n1\t2\n").unwrap();
/// let csr = CsrMatrix::from_edges(&edges).unwrap();
///
/// let (cols, values) = csr.row(2);
/// assert_eq!(cols, &[0, 1]);
/// assert_eq!(values, &[0.5, 1.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Row `i` spans `row_offsets[i]..row_offsets[i + 1]`
    /// Length: `nodes_count` + 1
    row_offsets: Vec<u32>,

    /// Predecessor (column) ids, ascending within a row
    /// Length: `edges_count`
    col_indices: Vec<u32>,

    /// `1 / out_degree[col]`
    /// Length: `edges_count`
    values: Vec<f32>,

    /// Dangling nodes (out-degree 0)
    leaves: Vec<u32>,
}

impl CsrMatrix {
    /// Build from an edge list
    ///
    /// Sorts a copy of the pairs by `(head, tail)` and assigns row boundaries
    /// in one pass.
    ///
    /// # Errors
    ///
    /// - [`PageRankError::InconsistentDegree`] if a stored edge's source has out-degree 0
    /// - an error if the edge count does not fit the `u32` offsets
    pub fn from_edges(edges: &EdgeList) -> Result<Self> {
        let nodes_count = edges.nodes_count();
        u32::try_from(edges.edges_count())
            .context("CSR offsets are u32: graphs with more than 4B edges are not supported")?;

        let sorted = edges.sorted_by_head();
        let out_degree = edges.out_degree();

        let mut row_offsets = Vec::with_capacity(nodes_count + 1);
        let mut col_indices = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());

        row_offsets.push(0_u32);
        let mut next = sorted.iter().peekable();
        for row in 0..nodes_count {
            while let Some(&[tail, _]) = next.next_if(|[_, head]| *head as usize == row) {
                let degree = out_degree[tail as usize];
                if degree == 0 {
                    return Err(PageRankError::InconsistentDegree { node: tail }.into());
                }
                col_indices.push(tail);
                #[allow(clippy::cast_precision_loss)]
                values.push(1.0 / degree as f32);
            }
            #[allow(clippy::cast_possible_truncation)] // checked above
            row_offsets.push(col_indices.len() as u32);
        }

        Ok(Self {
            row_offsets,
            col_indices,
            values,
            leaves: edges.leaves(),
        })
    }

    /// Columns and values of `row`
    #[must_use]
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let start = self.row_offsets[row] as usize;
        let end = self.row_offsets[row + 1] as usize;
        (&self.col_indices[start..end], &self.values[start..end])
    }

    /// Number of stored entries in `row`
    #[must_use]
    pub fn row_len(&self, row: usize) -> usize {
        (self.row_offsets[row + 1] - self.row_offsets[row]) as usize
    }

    /// Longest row (0 for a graph without edges)
    #[must_use]
    pub fn max_row_len(&self) -> usize {
        self.row_offsets
            .windows(2)
            .map(|w| (w[1] - w[0]) as usize)
            .max()
            .unwrap_or(0)
    }

    /// Get raw CSR components (for GPU upload)
    ///
    /// Returns `(row_offsets, col_indices, values)`
    #[must_use]
    pub fn csr_components(&self) -> (&[u32], &[u32], &[f32]) {
        (&self.row_offsets, &self.col_indices, &self.values)
    }

    /// `Σ values[k] * old[col[k]]` over `row`
    #[inline]
    pub(crate) fn row_dot(&self, row: usize, old: &[f32]) -> f32 {
        let (cols, values) = self.row(row);
        cols.iter()
            .zip(values)
            .map(|(&col, &value)| value * old[col as usize])
            .sum()
    }
}

impl SparseLayout for CsrMatrix {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Csr
    }

    fn nodes_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    fn edges_count(&self) -> usize {
        self.col_indices.len()
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

impl PullRows for CsrMatrix {
    fn gather_row(&self, row: usize, old: &[f32], damping: f32, seed: f32) -> f32 {
        seed + damping * self.row_dot(row, old)
    }
}
