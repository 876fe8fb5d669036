//! ELL (fixed-width, column-major) transition matrix
//!
//! Every row reserves `width = max row length` slots. Slot `k` of row `r`
//! lives at `k * num_rows + r`, so consecutive GPU threads (one per row) read
//! consecutive addresses. Padding slots hold column 0 and value 0, which adds
//! nothing to the product.
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2          (width 2, 3 rows)
//!
//!   col_indices: [0, 0, 0,   0, 0, 1]
//!   values:      [0, .5, .5, 0, 0, 1]
//!                 └ slot 0 ┘ └ slot 1 ┘
//! ```

use super::csr::CsrMatrix;
use super::edges::EdgeList;
use super::layout::{LayoutKind, PullRows, SparseLayout};
use anyhow::{Context, Result};

/// Column-major padded matrix
#[derive(Debug, Clone, PartialEq)]
pub struct EllMatrix {
    num_rows: usize,
    width: usize,
    /// Length: `width * num_rows`
    col_indices: Vec<u32>,
    /// Length: `width * num_rows`
    values: Vec<f32>,
    edges_count: usize,
    leaves: Vec<u32>,
}

impl EllMatrix {
    /// Build from an edge list
    ///
    /// # Errors
    ///
    /// Same as [`CsrMatrix::from_edges`], plus an error if the padded size overflows
    pub fn from_edges(edges: &EdgeList) -> Result<Self> {
        Self::from_csr(&CsrMatrix::from_edges(edges)?)
    }

    /// Re-pack a CSR matrix, keeping each row's entry order
    ///
    /// # Errors
    ///
    /// Returns an error if `width * num_rows` overflows
    pub fn from_csr(csr: &CsrMatrix) -> Result<Self> {
        let num_rows = csr.nodes_count();
        let width = csr.max_row_len();
        let slots = width
            .checked_mul(num_rows)
            .context("ELL padded size overflows")?;

        let mut col_indices = vec![0_u32; slots];
        let mut values = vec![0.0_f32; slots];
        for row in 0..num_rows {
            let (cols, vals) = csr.row(row);
            for (k, (&col, &value)) in cols.iter().zip(vals).enumerate() {
                col_indices[k * num_rows + row] = col;
                values[k * num_rows + row] = value;
            }
        }

        Ok(Self {
            num_rows,
            width,
            col_indices,
            values,
            edges_count: csr.edges_count(),
            leaves: csr.leaves().to_vec(),
        })
    }

    /// Slots reserved per row
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// `(column, value)` stored in slot `k` of `row`
    #[must_use]
    pub fn slot(&self, row: usize, k: usize) -> (u32, f32) {
        let idx = k * self.num_rows + row;
        (self.col_indices[idx], self.values[idx])
    }

    /// Raw column-major arrays `(col_indices, values)` (for GPU upload)
    #[must_use]
    pub fn ell_components(&self) -> (&[u32], &[f32]) {
        (&self.col_indices, &self.values)
    }

    /// Padding slots that hold no edge
    #[must_use]
    pub fn padding(&self) -> usize {
        self.col_indices.len() - self.edges_count
    }
}

impl SparseLayout for EllMatrix {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Ell
    }

    fn nodes_count(&self) -> usize {
        self.num_rows
    }

    fn edges_count(&self) -> usize {
        self.edges_count
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

impl PullRows for EllMatrix {
    fn gather_row(&self, row: usize, old: &[f32], damping: f32, seed: f32) -> f32 {
        let mut dot = 0.0_f32;
        for k in 0..self.width {
            let (col, value) = self.slot(row, k);
            dot += value * old[col as usize];
        }
        seed + damping * dot
    }
}
