//! sparse-pagerank: `PageRank` over sparse graph layouts
//!
//! # Overview
//!
//! sparse-pagerank computes `PageRank` by power iteration with leaked-mass
//! redistribution: rank held by dangling nodes, plus the teleport share,
//! is spread uniformly over every node each iteration, so the vector keeps
//! summing to one. The same iteration runs over five graph layouts and four
//! execution strategies.
//!
//! # Quick Start
//!
//! ```no_run
//! use sparse_pagerank::{read_edge_list, write_ranks, CsrMatrix, PageRankConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // "<nodes>\t<edges>" header, then one "<tail>\t<head>" per line
//! let edges = read_edge_list("graph.tsv").await?;
//! let layout = CsrMatrix::from_edges(&edges)?;
//!
//! let result = sparse_pagerank::pagerank(&layout, &PageRankConfig::default())?;
//! println!("{} iterations ({:?})", result.iterations, result.stop_reason);
//!
//! write_ranks("ranks.txt", &result.scores).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: edge-list ingestion; adjacency-out, adjacency-in, CSR, ELL
//!   and JDS layouts; text and Parquet persistence of edges and ranks
//! - **Algorithms**: one power-iteration engine driven by sequential,
//!   rayon-parallel and row-partitioned distributed strategies
//! - **GPU** (`gpu` feature): wgpu compute kernels for CSR, ELL and JDS
//! - **Comm**: the collectives the distributed strategy needs, with an
//!   in-process implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod comm;
pub mod config;
pub mod error;
pub mod storage;

// GPU strategy (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export core types
pub use algorithms::{
    compare_ranks, distributed_pagerank, non_monotone_steps, pagerank, parallel_pagerank,
    row_range, Inconsistency, PageRankResult, ParallelPageRank, Phase, PowerIteration,
    RankBuffers, DEFAULT_TOLERANCE,
};
pub use comm::{Communicator, LocalCluster, LocalCommunicator};
pub use config::{GpuConfig, LayoutOptions, PageRankConfig, StopReason};
pub use error::PageRankError;
pub use storage::{
    format_ranks, parse_ranks, read_edge_list, read_ranks, write_ranks, AdjacencyIn,
    AdjacencyOut, CsrMatrix, EdgeList, EllMatrix, GraphLayout, JdsMatrix, JdsPiece, LayoutKind,
    NodeId, PullRows, RowPartition, SparseLayout,
};

#[cfg(feature = "storage")]
pub use storage::{read_ranks_parquet, write_ranks_parquet};

#[cfg(feature = "gpu")]
pub use gpu::{gpu_pagerank, GpuDevice, GpuDeviceError, GpuLayout, GpuMemoryLimits};

// Error type
pub use anyhow::{Error, Result};
