//! Error taxonomy
//!
//! Every failure the core can report falls into one of four categories:
//!
//! - **Input**: the edge-list source is unreadable or malformed
//! - **Consistency**: the degree pass and the edge pass disagree while building a layout
//! - **Configuration**: the run parameters are unusable (e.g. no stop condition)
//! - **Backend**: a message-passing primitive failed (GPU failures use
//!   `gpu::GpuDeviceError` behind the `gpu` feature)
//!
//! None of them is recoverable inside the core: the run aborts and no partial
//! output is produced. Public functions return [`anyhow::Result`], so callers
//! that need the category use `err.downcast_ref::<PageRankError>()`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by ingestion, layout construction, configuration and message passing
#[derive(Debug, Error)]
pub enum PageRankError {
    /// The edge-list source could not be opened or read
    #[error("cannot read edge list `{}`", path.display())]
    UnreadableSource {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The first record is not `nodes_count edges_count`
    #[error("malformed header on line {line}: expected `<nodes_count> <edges_count>`")]
    MalformedHeader {
        /// 1-based line number of the header
        line: usize,
    },

    /// An edge record is not a pair of integers
    #[error("malformed edge record on line {line}: `{content}`")]
    MalformedRecord {
        /// 1-based line number
        line: usize,
        /// Offending text
        content: String,
    },

    /// An edge references a node outside `[0, nodes_count)`
    #[error("node {node} on line {line} is outside [0, {nodes_count})")]
    NodeOutOfRange {
        /// 1-based line number (0 for programmatic construction)
        line: usize,
        /// Offending node id as written
        node: i64,
        /// Declared number of nodes
        nodes_count: usize,
    },

    /// The number of edge records differs from the header
    #[error("header declares {declared} edges but {found} were read")]
    EdgeCountMismatch {
        /// Edge count from the header
        declared: usize,
        /// Records actually present
        found: usize,
    },

    /// A stored edge has a source whose recorded out-degree does not account for it
    #[error(
        "inconsistent degrees: node {node} is the source of a stored edge \
         but its recorded degree does not cover it"
    )]
    InconsistentDegree {
        /// Node whose degree disagrees with the edge pass
        node: u32,
    },

    /// Convergence checking and the iteration ceiling are both disabled
    #[error("no stop condition: enable convergence checking or set max_iterations > 0")]
    NoStopCondition,

    /// Damping factor outside `[0, 1]`
    #[error("damping factor {0} is outside [0, 1]")]
    InvalidDamping(f32),

    /// Convergence epsilon is not a positive finite number
    #[error("convergence epsilon {0} must be positive and finite")]
    InvalidEpsilon(f64),

    /// JDS requested with zero pieces
    #[error("JDS layout needs at least one piece")]
    InvalidPieceCount,

    /// GPU launch sizing is unusable
    #[error(
        "invalid GPU sizing: warp size {warp_size} and workgroup size {workgroup_size} \
         must be powers of two with warp <= workgroup"
    )]
    InvalidWorkgroup {
        /// Threads cooperating on one CSR row
        warp_size: u32,
        /// Threads per workgroup
        workgroup_size: u32,
    },

    /// A message-passing primitive failed
    #[error("communication with participant {peer} failed: {reason}")]
    Communication {
        /// Peer on the other end of the failed exchange
        peer: usize,
        /// What went wrong
        reason: String,
    },
}
