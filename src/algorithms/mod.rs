//! `PageRank` strategies
//!
//! One power-iteration engine ([`pagerank::PowerIteration`]) shared by a
//! sequential, a shared-memory parallel and a distributed strategy; the GPU
//! strategy lives in [`crate::gpu`] behind the `gpu` feature.

pub mod distributed;
pub mod pagerank;
pub mod parallel;
pub mod validation;

pub use distributed::{distributed_pagerank, row_range};
pub use pagerank::{pagerank, PageRankResult, Phase, PowerIteration, RankBuffers};
pub use parallel::{parallel_pagerank, ParallelPageRank};
pub use validation::{compare_ranks, non_monotone_steps, Inconsistency, DEFAULT_TOLERANCE};
