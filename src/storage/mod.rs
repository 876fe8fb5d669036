//! Graph storage layer
//!
//! Edge-list ingestion, the five sparse layouts the power iteration runs on,
//! and result persistence (plain text, plus Parquet behind the `storage` feature).

pub mod adjacency;
pub mod csr;
pub mod edges;
pub mod ell;
pub mod jds;
pub mod layout;
#[cfg(feature = "storage")]
pub mod parquet;
pub mod ranks;

pub use adjacency::{AdjacencyIn, AdjacencyOut, RowPartition};
pub use csr::CsrMatrix;
pub use edges::{read_edge_list, EdgeList, NodeId};
pub use ell::EllMatrix;
pub use jds::{JdsMatrix, JdsPiece};
pub use layout::{GraphLayout, LayoutKind, PullRows, SparseLayout};
#[cfg(feature = "storage")]
pub use parquet::{read_ranks_parquet, write_ranks_parquet};
pub use ranks::{format_ranks, parse_ranks, read_ranks, write_ranks};
