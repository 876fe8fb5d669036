//! GPU `PageRank` strategy
//!
//! Based on research from:
//! - **Bell & Garland** (SC 2009) - CSR-vector and ELL `SpMV` kernels
//! - **`GraphBLAST`** (Yang et al., 2022) - GPU linear algebra for graphs
//! - **Gunrock** (Wang et al., ACM `ToPC` 2017) - GPU graph primitives
//!
//! # Architecture
//!
//! - `device`: GPU device initialization, kernel compilation, error types
//! - `memory`: device limits and up-front fit checks
//! - `buffer`: GPU buffers for CSR, ELL and JDS layouts
//! - `kernel`: WGSL compute kernels and their pipelines
//! - `pagerank`: the per-iteration launch sequence
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod buffer;
mod device;
mod kernel;
mod memory;
mod pagerank;

pub use buffer::{
    GpuLayout, GpuLayoutBuffers, GpuMatrixBuffers, GpuPieceBuffers, PieceParams, RunParams,
};
pub use device::{GpuDevice, GpuDeviceError};
pub use kernel::{kernel_source, launch_grid, Access, ComputeKernel, KernelKind};
pub use memory::{GpuMemoryLimits, USABLE_FRACTION};
pub use pagerank::gpu_pagerank;
