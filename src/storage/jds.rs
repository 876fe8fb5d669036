//! JDS (length-bucketed ELL) transition matrix
//!
//! Rows are grouped by their number of stored entries into pieces, and each
//! piece is an independent column-major ELL block padded only to the longest
//! row inside it, with `row_ind` mapping block rows back to node ids. On
//! skewed degree distributions this removes most of ELL's padding at the cost
//! of one indirection per row.
//!
//! # Bucketing
//!
//! With `min`/`max` the shortest/longest non-empty row and
//! `interval = max - min + 1`, piece `p` of `P` covers row lengths
//!
//! ```text
//! [min + p * interval / P,  min + (p + 1) * interval / P - 1]
//! ```
//!
//! (integer division). When `P > interval` some pieces cover no length at
//! all and are dropped, so the built matrix may have fewer pieces than
//! requested. Rows with no stored entries belong to no piece and are flagged
//! in [`JdsMatrix::dangling`].

use super::csr::CsrMatrix;
use super::edges::EdgeList;
use super::layout::{LayoutKind, SparseLayout};
use crate::error::PageRankError;
use anyhow::Result;

/// One ELL block of rows with similar length
#[derive(Debug, Clone, PartialEq)]
pub struct JdsPiece {
    /// Node id of each block row, ascending
    row_ind: Vec<u32>,
    /// Slots per block row
    width: usize,
    /// Length: `width * row_ind.len()`, column-major
    col_indices: Vec<u32>,
    /// Length: `width * row_ind.len()`, column-major
    values: Vec<f32>,
    num_nonzeros: usize,
}

impl JdsPiece {
    /// Node ids of the rows in this piece
    #[must_use]
    pub fn row_ind(&self) -> &[u32] {
        &self.row_ind
    }

    /// Number of rows in this piece
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_ind.len()
    }

    /// Slots reserved per row
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Stored (non-padding) entries
    #[must_use]
    pub const fn num_nonzeros(&self) -> usize {
        self.num_nonzeros
    }

    /// Raw column-major arrays `(col_indices, values)` (for GPU upload)
    #[must_use]
    pub fn ell_components(&self) -> (&[u32], &[f32]) {
        (&self.col_indices, &self.values)
    }

    fn dot(&self, local: usize, old: &[f32]) -> f32 {
        let rows = self.num_rows();
        let mut dot = 0.0_f32;
        for k in 0..self.width {
            let idx = k * rows + local;
            dot += self.values[idx] * old[self.col_indices[idx] as usize];
        }
        dot
    }
}

/// Bucketed ELL matrix
///
/// # Example
///
/// ```
/// use sparse_pagerank::{EdgeList, JdsMatrix};
///
/// // row lengths: node 0 -> 1, node 1 -> 0, node 2 -> 3
/// let edges = EdgeList::parse("4\t4\n1\t0\n0\t2\n1\t2\n3\t2\n").unwrap();
/// let jds = JdsMatrix::from_edges(&edges, 8).unwrap();
///
/// assert_eq!(jds.num_pieces(), 2);  // lengths 1 and 3, the other buckets are empty
/// assert_eq!(jds.dangling(), &[false, true, false, true]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JdsMatrix {
    nodes_count: usize,
    pieces: Vec<JdsPiece>,
    /// `dangling[r]`: row `r` has no stored entries
    dangling: Vec<bool>,
    num_nonzeros: usize,
    leaves: Vec<u32>,
}

impl JdsMatrix {
    /// Build from an edge list with `num_pieces` requested buckets
    ///
    /// # Errors
    ///
    /// - [`PageRankError::InvalidPieceCount`] if `num_pieces == 0`
    /// - the errors of [`CsrMatrix::from_edges`]
    pub fn from_edges(edges: &EdgeList, num_pieces: usize) -> Result<Self> {
        if num_pieces == 0 {
            return Err(PageRankError::InvalidPieceCount.into());
        }
        Self::from_csr(&CsrMatrix::from_edges(edges)?, num_pieces)
    }

    /// Re-pack a CSR matrix into length buckets
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InvalidPieceCount`] if `num_pieces == 0`
    pub fn from_csr(csr: &CsrMatrix, num_pieces: usize) -> Result<Self> {
        if num_pieces == 0 {
            return Err(PageRankError::InvalidPieceCount.into());
        }
        let nodes_count = csr.nodes_count();
        let dangling: Vec<bool> = (0..nodes_count).map(|r| csr.row_len(r) == 0).collect();

        let lengths = (0..nodes_count)
            .map(|r| csr.row_len(r))
            .filter(|&len| len > 0);
        let (min, max) = lengths.fold((usize::MAX, 0), |(lo, hi), len| (lo.min(len), hi.max(len)));

        let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); if max == 0 { 0 } else { num_pieces }];
        if max > 0 {
            let interval = (max - min + 1) as u64;
            let pieces = num_pieces as u64;
            for row in 0..nodes_count {
                let len = csr.row_len(row);
                if len == 0 {
                    continue;
                }
                // unique p with min + p*I/P <= len <= min + (p+1)*I/P - 1
                let offset = (len - min) as u64 + 1;
                #[allow(clippy::cast_possible_truncation)] // bucket < num_pieces
                let bucket = ((offset * pieces - 1) / interval) as usize;
                #[allow(clippy::cast_possible_truncation)]
                buckets[bucket].push(row as u32);
            }
        }

        let pieces: Vec<JdsPiece> = buckets
            .into_iter()
            .filter(|rows| !rows.is_empty())
            .map(|rows| pack_piece(csr, rows))
            .collect();

        log::debug!(
            "JDS: {} of {num_pieces} requested pieces non-empty (row lengths {}..={max})",
            pieces.len(),
            if max == 0 { 0 } else { min }
        );

        Ok(Self {
            nodes_count,
            num_nonzeros: pieces.iter().map(JdsPiece::num_nonzeros).sum(),
            pieces,
            dangling,
            leaves: csr.leaves().to_vec(),
        })
    }

    /// Non-empty pieces in ascending length order
    #[must_use]
    pub fn pieces(&self) -> &[JdsPiece] {
        &self.pieces
    }

    /// Number of non-empty pieces
    #[must_use]
    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Per-row flag: no stored entries
    #[must_use]
    pub fn dangling(&self) -> &[bool] {
        &self.dangling
    }
}

fn pack_piece(csr: &CsrMatrix, row_ind: Vec<u32>) -> JdsPiece {
    let rows = row_ind.len();
    let width = row_ind
        .iter()
        .map(|&r| csr.row_len(r as usize))
        .max()
        .unwrap_or(0);

    let mut col_indices = vec![0_u32; width * rows];
    let mut values = vec![0.0_f32; width * rows];
    let mut num_nonzeros = 0;
    for (local, &row) in row_ind.iter().enumerate() {
        let (cols, vals) = csr.row(row as usize);
        for (k, (&col, &value)) in cols.iter().zip(vals).enumerate() {
            col_indices[k * rows + local] = col;
            values[k * rows + local] = value;
        }
        num_nonzeros += cols.len();
    }

    JdsPiece {
        row_ind,
        width,
        col_indices,
        values,
        num_nonzeros,
    }
}

impl SparseLayout for JdsMatrix {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Jds
    }

    fn nodes_count(&self) -> usize {
        self.nodes_count
    }

    fn edges_count(&self) -> usize {
        self.num_nonzeros
    }

    fn leaves(&self) -> &[u32] {
        &self.leaves
    }

    fn accumulate(&self, old: &[f32], new: &mut [f32], damping: f32) {
        for piece in &self.pieces {
            for (local, &row) in piece.row_ind.iter().enumerate() {
                new[row as usize] += damping * piece.dot(local, old);
            }
        }
    }
}
