//! Shared-memory parallel `PageRank`
//!
//! Pull-style sweep over write-disjoint rows: each rayon task owns a slice of
//! `new` and only reads `old`, so the parallel region needs no locking. Row
//! cost is the in-degree, which varies wildly on real graphs; rayon's work
//! stealing rebalances those splits dynamically, with `min_rows_per_task`
//! bounding how finely cheap rows get split.
//!
//! The leaked-mass and norm reductions stay on the engine's sequential path,
//! so a parallel adjacency-in run is bit-identical to the sequential one.

use super::pagerank::{log_finished, PageRankResult, PowerIteration};
use crate::config::PageRankConfig;
use crate::storage::PullRows;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;

/// Default lower bound on rows per rayon task
pub const DEFAULT_MIN_ROWS_PER_TASK: usize = 256;

/// Parallel strategy settings
///
/// # Example
///
/// ```
/// use sparse_pagerank::{AdjacencyIn, EdgeList, PageRankConfig, ParallelPageRank};
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n1\t2\n2\t0\n").unwrap();
/// let layout = AdjacencyIn::from_edges(&edges).unwrap();
///
/// let result = ParallelPageRank::default()
///     .with_threads(2)
///     .run(&layout, &PageRankConfig::default())
///     .unwrap();
/// assert_eq!(result.scores.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelPageRank {
    /// Rows below which a task is not split further
    pub min_rows_per_task: usize,
    /// Dedicated pool size (`None` = rayon's global pool)
    pub threads: Option<usize>,
}

impl Default for ParallelPageRank {
    fn default() -> Self {
        Self {
            min_rows_per_task: DEFAULT_MIN_ROWS_PER_TASK,
            threads: None,
        }
    }
}

impl ParallelPageRank {
    /// Run on a dedicated pool of `threads` workers
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the minimum rows per task
    #[must_use]
    pub const fn with_min_rows_per_task(mut self, rows: usize) -> Self {
        self.min_rows_per_task = rows;
        self
    }

    /// Compute `PageRank` with a parallel sweep
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or an error if the dedicated thread
    /// pool cannot be created
    pub fn run<L: PullRows>(&self, layout: &L, config: &PageRankConfig) -> Result<PageRankResult> {
        match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("pagerank-{i}"))
                    .build()
                    .context("Failed to build rayon thread pool")?;
                pool.install(|| self.run_in_current_pool(layout, config))
            }
            None => self.run_in_current_pool(layout, config),
        }
    }

    fn run_in_current_pool<L: PullRows>(
        &self,
        layout: &L,
        config: &PageRankConfig,
    ) -> Result<PageRankResult> {
        let start = Instant::now();
        let damping = config.damping;
        let min_len = self.min_rows_per_task.max(1);

        let mut engine = PowerIteration::new(layout.nodes_count(), layout.leaves(), config)?;
        engine.run(|old, new| {
            new.par_iter_mut()
                .enumerate()
                .with_min_len(min_len)
                .for_each(|(row, slot)| *slot = layout.gather_row(row, old, damping, *slot));
        });
        let result = engine.finish();

        log_finished(
            &format!(
                "parallel/{}x{}",
                layout.kind(),
                rayon::current_num_threads()
            ),
            &result,
            config,
            start.elapsed(),
        );
        Ok(result)
    }
}

/// [`ParallelPageRank::run`] with default settings
///
/// # Errors
///
/// Returns a configuration error if `config` is invalid
pub fn parallel_pagerank<L: PullRows>(
    layout: &L,
    config: &PageRankConfig,
) -> Result<PageRankResult> {
    ParallelPageRank::default().run(layout, config)
}
