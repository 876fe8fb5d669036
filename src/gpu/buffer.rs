//! GPU buffer management for the device-side layouts
//!
//! Uploads the read-only matrix arrays of a CSR, ELL or JDS layout once per
//! run. Empty arrays are padded to one element because wgpu rejects
//! zero-sized bindings.

use super::device::{GpuDevice, GpuDeviceError};
use crate::storage::{CsrMatrix, EllMatrix, GraphLayout, JdsMatrix, LayoutKind, SparseLayout};
use anyhow::{bail, Result};
use std::mem::size_of;

/// Per-run parameters shared by most kernels (16 bytes, uniform-compatible)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RunParams {
    /// Nodes in the graph
    pub num_nodes: u32,
    /// Dangling nodes
    pub num_leaves: u32,
    /// Damping factor
    pub damping: f32,
    _pad: u32,
}

impl RunParams {
    /// Parameters of one run
    #[must_use]
    pub const fn new(num_nodes: u32, num_leaves: u32, damping: f32) -> Self {
        Self {
            num_nodes,
            num_leaves,
            damping,
            _pad: 0,
        }
    }
}

/// Shape of one ELL block
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PieceParams {
    /// Rows in the block
    pub num_rows: u32,
    /// Slots per row
    pub width: u32,
    _pad0: u32,
    _pad1: u32,
}

impl PieceParams {
    /// Parameters of a `num_rows` x `width` block
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension exceeds `u32`
    pub fn new(num_rows: usize, width: usize) -> Result<Self> {
        Ok(Self {
            num_rows: u32::try_from(num_rows)?,
            width: u32::try_from(width)?,
            _pad0: 0,
            _pad1: 0,
        })
    }
}

/// Layouts with a GPU kernel
///
/// # Example
///
/// ```ignore
/// # use sparse_pagerank::gpu::GpuLayout;
/// let layout = GpuLayout::try_from(&graph_layout)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub enum GpuLayout<'a> {
    /// CSR-vector kernel
    Csr(&'a CsrMatrix),
    /// ELL-scalar kernel
    Ell(&'a EllMatrix),
    /// One launch per JDS piece
    Jds(&'a JdsMatrix),
}

impl<'a> From<&'a CsrMatrix> for GpuLayout<'a> {
    fn from(csr: &'a CsrMatrix) -> Self {
        Self::Csr(csr)
    }
}

impl<'a> From<&'a EllMatrix> for GpuLayout<'a> {
    fn from(ell: &'a EllMatrix) -> Self {
        Self::Ell(ell)
    }
}

impl<'a> From<&'a JdsMatrix> for GpuLayout<'a> {
    fn from(jds: &'a JdsMatrix) -> Self {
        Self::Jds(jds)
    }
}

impl<'a> TryFrom<&'a GraphLayout> for GpuLayout<'a> {
    type Error = anyhow::Error;

    fn try_from(layout: &'a GraphLayout) -> Result<Self> {
        match layout {
            GraphLayout::Csr(csr) => Ok(Self::Csr(csr)),
            GraphLayout::Ell(ell) => Ok(Self::Ell(ell)),
            GraphLayout::Jds(jds) => Ok(Self::Jds(jds)),
            other => bail!("no GPU kernel for the {} layout", other.kind()),
        }
    }
}

const WORD: u64 = size_of::<u32>() as u64;

/// Bytes of a buffer holding `len` words (padded to one)
fn words(len: usize) -> u64 {
    len.max(1) as u64 * WORD
}

impl GpuLayout<'_> {
    /// Host-side layout behind this view
    #[must_use]
    pub fn as_layout(&self) -> &dyn SparseLayout {
        match *self {
            Self::Csr(l) => l,
            Self::Ell(l) => l,
            Self::Jds(l) => l,
        }
    }

    /// Representation kind
    #[must_use]
    pub fn kind(&self) -> LayoutKind {
        self.as_layout().kind()
    }

    /// Every device buffer a run allocates, as `(label, bytes)`
    #[must_use]
    pub fn buffer_sizes(&self) -> Vec<(&'static str, u64)> {
        let nodes = self.as_layout().nodes_count();
        let mut sizes = vec![
            ("ranks_in", words(nodes)),
            ("ranks_out", words(nodes)),
            ("leaves", words(self.as_layout().leaves().len())),
            ("leaked", WORD),
        ];
        match *self {
            Self::Csr(csr) => {
                let (offsets, cols, values) = csr.csr_components();
                sizes.push(("row_offsets", words(offsets.len())));
                sizes.push(("col_indices", words(cols.len())));
                sizes.push(("values", words(values.len())));
            }
            Self::Ell(ell) => {
                let (cols, values) = ell.ell_components();
                sizes.push(("col_indices", words(cols.len())));
                sizes.push(("values", words(values.len())));
            }
            Self::Jds(jds) => {
                sizes.push(("dangling", words(nodes)));
                for piece in jds.pieces() {
                    let (cols, values) = piece.ell_components();
                    sizes.push(("row_ind", words(piece.num_rows())));
                    sizes.push(("col_indices", words(cols.len())));
                    sizes.push(("values", words(values.len())));
                }
            }
        }
        sizes
    }
}

/// Upload `data` as a storage buffer
///
/// # Errors
///
/// Returns error if buffer creation fails
pub fn storage_buffer<T: bytemuck::Pod>(
    device: &GpuDevice,
    label: &str,
    data: &[T],
    usage: wgpu::BufferUsages,
) -> Result<wgpu::Buffer, GpuDeviceError> {
    let padding = [T::zeroed()];
    let contents = if data.is_empty() { &padding[..] } else { data };
    device.create_buffer_init(
        label,
        bytemuck::cast_slice(contents),
        wgpu::BufferUsages::STORAGE | usage,
    )
}

/// Upload a parameter block as a uniform buffer
///
/// # Errors
///
/// Returns error if buffer creation fails
pub fn uniform_buffer<T: bytemuck::Pod>(
    device: &GpuDevice,
    label: &str,
    params: &T,
) -> Result<wgpu::Buffer, GpuDeviceError> {
    device.create_buffer_init(
        label,
        bytemuck::bytes_of(params),
        wgpu::BufferUsages::UNIFORM,
    )
}

/// Device copy of one JDS piece
#[derive(Debug)]
pub struct GpuPieceBuffers {
    /// [`PieceParams`] uniform
    pub params: wgpu::Buffer,
    /// Block row → node id
    pub row_ind: wgpu::Buffer,
    /// Column-major column indices
    pub col_indices: wgpu::Buffer,
    /// Column-major values
    pub values: wgpu::Buffer,
    /// Rows in the piece
    pub num_rows: u32,
}

/// Device copy of the matrix arrays
#[derive(Debug)]
pub enum GpuMatrixBuffers {
    /// CSR arrays
    Csr {
        /// Row pointers (`num_nodes + 1`)
        row_offsets: wgpu::Buffer,
        /// Source node of every entry
        col_indices: wgpu::Buffer,
        /// `1 / out_degree` of every entry
        values: wgpu::Buffer,
    },
    /// ELL arrays
    Ell {
        /// [`PieceParams`] uniform covering all rows
        params: wgpu::Buffer,
        /// Column-major column indices
        col_indices: wgpu::Buffer,
        /// Column-major values
        values: wgpu::Buffer,
    },
    /// JDS pieces
    Jds {
        /// One entry per non-empty piece
        pieces: Vec<GpuPieceBuffers>,
        /// 1 for rows outside every piece
        dangling: wgpu::Buffer,
    },
}

/// GPU buffers for one layout
#[derive(Debug)]
pub struct GpuLayoutBuffers {
    /// Number of nodes in the graph
    pub num_nodes: usize,

    /// Number of edges in the graph
    pub num_edges: usize,

    /// Number of dangling nodes
    pub num_leaves: usize,

    /// Dangling node ids (one padding element when there are none)
    pub leaves: wgpu::Buffer,

    /// Matrix arrays
    pub matrix: GpuMatrixBuffers,
}

impl GpuLayoutBuffers {
    /// Upload `layout` to the device
    ///
    /// # Errors
    ///
    /// Returns error if buffer creation fails or a dimension exceeds `u32`
    pub fn upload(device: &GpuDevice, layout: GpuLayout<'_>) -> Result<Self> {
        let host = layout.as_layout();
        let none = wgpu::BufferUsages::empty();

        let matrix = match layout {
            GpuLayout::Csr(csr) => {
                let (offsets, cols, values) = csr.csr_components();
                GpuMatrixBuffers::Csr {
                    row_offsets: storage_buffer(device, "CSR row_offsets", offsets, none)?,
                    col_indices: storage_buffer(device, "CSR col_indices", cols, none)?,
                    values: storage_buffer(device, "CSR values", values, none)?,
                }
            }
            GpuLayout::Ell(ell) => {
                let (cols, values) = ell.ell_components();
                let params = PieceParams::new(ell.nodes_count(), ell.width())?;
                GpuMatrixBuffers::Ell {
                    params: uniform_buffer(device, "ELL params", &params)?,
                    col_indices: storage_buffer(device, "ELL col_indices", cols, none)?,
                    values: storage_buffer(device, "ELL values", values, none)?,
                }
            }
            GpuLayout::Jds(jds) => {
                let pieces = jds
                    .pieces()
                    .iter()
                    .map(|piece| {
                        let (cols, values) = piece.ell_components();
                        let params = PieceParams::new(piece.num_rows(), piece.width())?;
                        Ok(GpuPieceBuffers {
                            params: uniform_buffer(device, "JDS piece params", &params)?,
                            row_ind: storage_buffer(device, "JDS row_ind", piece.row_ind(), none)?,
                            col_indices: storage_buffer(device, "JDS col_indices", cols, none)?,
                            values: storage_buffer(device, "JDS values", values, none)?,
                            num_rows: params.num_rows,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let flags: Vec<u32> = jds.dangling().iter().map(|&d| u32::from(d)).collect();
                GpuMatrixBuffers::Jds {
                    pieces,
                    dangling: storage_buffer(device, "JDS dangling", &flags, none)?,
                }
            }
        };

        Ok(Self {
            num_nodes: host.nodes_count(),
            num_edges: host.edges_count(),
            num_leaves: host.leaves().len(),
            leaves: storage_buffer(device, "leaves", host.leaves(), none)?,
            matrix,
        })
    }

    /// Get number of nodes
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Get number of dangling nodes
    #[must_use]
    pub const fn num_leaves(&self) -> usize {
        self.num_leaves
    }
}
