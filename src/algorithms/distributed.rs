//! Row-partitioned distributed `PageRank`
//!
//! Participant `p` of `w` owns rows `[p*n/w, (p+1)*n/w)` of the adjacency-in
//! layout and keeps a full copy of the rank vector. Per iteration:
//!
//! 1. rank 0 computes the leaked mass from the full `old` vector and broadcasts it
//! 2. every participant pulls its own rows of `new`
//! 3. each adds up `Σ (new - old)²` over its rows
//! 4. an all-gather with per-participant counts rebuilds the full `new` vector everywhere
//! 5. the squared sums are reduced to rank 0, which takes the square root,
//!    applies the stop rule and broadcasts the decision (and, on stopping, the reason)
//!
//! Communication is O(n) per iteration. Broadcasting the decision keeps every
//! participant on the same iteration count, so nobody is left waiting in a
//! collective the others have skipped.

use super::pagerank::{
    leaked_mass, log_finished, normalize, seed, squared_distance, PageRankResult, RankBuffers,
};
use crate::comm::{Communicator, LocalCluster};
use crate::config::{PageRankConfig, StopReason};
use crate::storage::{AdjacencyIn, RowPartition, SparseLayout};
use anyhow::Result;
use log::debug;
use std::ops::Range;
use std::time::Instant;

/// Participant that decides and broadcasts
pub const ROOT: usize = 0;

/// Rows owned by `rank` out of `world_size` participants
///
/// Ranges are contiguous, cover `0..nodes_count` and differ in length by at
/// most one row.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // result <= nodes_count
pub fn row_range(rank: usize, world_size: usize, nodes_count: usize) -> Range<usize> {
    let bound = |p: usize| (p as u64 * nodes_count as u64 / world_size as u64) as usize;
    bound(rank)..bound(rank + 1)
}

/// Run one participant's side of a distributed `PageRank`
///
/// Every participant of `comm` must call this with the same configuration
/// and its own [`RowPartition`]. The returned result is identical on every
/// participant except that only rank 0 records the residual history.
///
/// # Errors
///
/// Returns a configuration error, or a communication error if any
/// collective fails
pub fn distributed_pagerank<C: Communicator>(
    comm: &C,
    partition: &RowPartition,
    config: &PageRankConfig,
) -> Result<PageRankResult> {
    config.validate()?;
    let start = Instant::now();
    let is_root = comm.rank() == ROOT;
    let nodes_count = partition.nodes_count();
    let rows = partition.rows();

    let counts = comm.all_gather_counts(rows.len())?;
    let mut buffers = RankBuffers::uniform(nodes_count);
    let mut local = vec![0.0_f32; rows.len()];
    let mut residuals = Vec::new();
    let mut iterations = 0;

    let stop_reason = loop {
        if nodes_count == 0 {
            break StopReason::Converged;
        }

        let leaked = if is_root {
            leaked_mass(buffers.current(), partition.leaves(), config.damping)
        } else {
            0.0
        };
        let leaked = comm.broadcast_f32(ROOT, leaked)?;

        let (old, new) = buffers.split();
        seed(&mut local, leaked, nodes_count);
        for (i, slot) in local.iter_mut().enumerate() {
            *slot = partition.gather_row(i, old, config.damping, *slot);
        }
        let local_squares = squared_distance(&local, &old[rows.clone()]);

        comm.all_gather_varcount(&local, &counts, new)?;
        buffers.swap();
        iterations += 1;

        let total = comm.reduce_sum(ROOT, local_squares)?;
        let decision = total.and_then(|squares| {
            let norm = squares.sqrt();
            residuals.push(norm);
            debug!("iteration {iterations}: leaked {leaked:.6}, norm {norm:.3e}");
            config.stop_reason(iterations, norm)
        });
        if comm.broadcast_flag(ROOT, decision.is_some())? {
            let converged = comm.broadcast_flag(ROOT, decision == Some(StopReason::Converged))?;
            break if converged {
                StopReason::Converged
            } else {
                StopReason::MaxIterations
            };
        }
    };

    let mut scores = buffers.into_current();
    normalize(&mut scores);
    let result = PageRankResult {
        scores,
        iterations,
        stop_reason,
        residuals,
    };
    if is_root {
        log_finished(
            &format!("distributed/{}x", comm.world_size()),
            &result,
            config,
            start.elapsed(),
        );
    }
    Ok(result)
}

impl LocalCluster {
    /// Partition `layout` across this cluster and run `PageRank`
    ///
    /// Returns rank 0's result.
    ///
    /// # Errors
    ///
    /// Returns the first participant's error
    ///
    /// # Example
    ///
    /// ```
    /// use sparse_pagerank::{AdjacencyIn, EdgeList, LocalCluster, PageRankConfig};
    ///
    /// let edges = EdgeList::parse("4\t3\n0\t1\n0\t2\n0\t3\n").unwrap();
    /// let layout = AdjacencyIn::from_edges(&edges).unwrap();
    ///
    /// let result = LocalCluster::new(3)
    ///     .unwrap()
    ///     .run_pagerank(&layout, &PageRankConfig::default())
    ///     .unwrap();
    /// assert!((result.scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    /// ```
    pub fn run_pagerank(
        &self,
        layout: &AdjacencyIn,
        config: &PageRankConfig,
    ) -> Result<PageRankResult> {
        let nodes_count = layout.nodes_count();
        let world_size = self.world_size();
        let mut results = self.run(|comm| {
            let partition = layout.partition(row_range(comm.rank(), world_size, nodes_count));
            distributed_pagerank(comm, &partition, config)
        })?;
        Ok(results.swap_remove(ROOT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::pagerank::pagerank;
    use crate::storage::EdgeList;

    fn fixture() -> EdgeList {
        EdgeList::parse("7\t9\n0\t1\n0\t2\n1\t2\n2\t0\n2\t3\n3\t4\n4\t0\n4\t5\n1\t6\n").unwrap()
    }

    #[test]
    fn test_row_ranges_cover_everything() {
        for (n, w) in [(10, 3), (3, 5), (0, 2), (1000, 7)] {
            let mut next = 0;
            for p in 0..w {
                let range = row_range(p, w, n);
                assert_eq!(range.start, next);
                assert!(range.len() <= n / w + 1);
                next = range.end;
            }
            assert_eq!(next, n);
        }
    }

    #[test]
    fn test_matches_sequential() {
        let adj = AdjacencyIn::from_edges(&fixture()).unwrap();
        let config = PageRankConfig::default();
        let sequential = pagerank(&adj, &config).unwrap();

        for world_size in [1, 2, 3, 7, 9] {
            let result = LocalCluster::new(world_size)
                .unwrap()
                .run_pagerank(&adj, &config)
                .unwrap();
            assert_eq!(result.iterations, sequential.iterations, "w={world_size}");
            for (a, b) in result.scores.iter().zip(&sequential.scores) {
                assert!((a - b).abs() < 1e-6, "w={world_size}");
            }
        }
    }

    #[test]
    fn test_every_participant_agrees() {
        let adj = AdjacencyIn::from_edges(&fixture()).unwrap();
        let config = PageRankConfig::default().with_max_iterations(15);
        let nodes_count = 7;

        let results = LocalCluster::new(3)
            .unwrap()
            .run(|comm| {
                let partition = adj.partition(row_range(comm.rank(), 3, nodes_count));
                distributed_pagerank(comm, &partition, &config)
            })
            .unwrap();

        for result in &results[1..] {
            assert_eq!(result.scores, results[0].scores);
            assert_eq!(result.iterations, results[0].iterations);
            assert_eq!(result.stop_reason, results[0].stop_reason);
        }
        assert_eq!(results[0].residuals.len(), results[0].iterations);
        assert!(results[1].residuals.is_empty());
    }

    #[test]
    fn test_iteration_ceiling() {
        let adj = AdjacencyIn::from_edges(&fixture()).unwrap();
        let config = PageRankConfig::default()
            .with_convergence_check(false)
            .with_max_iterations(5);
        let result = LocalCluster::new(2)
            .unwrap()
            .run_pagerank(&adj, &config)
            .unwrap();
        assert_eq!(result.iterations, 5);
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
    }

    #[test]
    fn test_empty_graph() {
        let adj = AdjacencyIn::from_edges(&EdgeList::parse("0\t0\n").unwrap()).unwrap();
        let result = LocalCluster::new(2)
            .unwrap()
            .run_pagerank(&adj, &PageRankConfig::default())
            .unwrap();
        assert!(result.scores.is_empty());
        assert_eq!(result.iterations, 0);
    }
}
