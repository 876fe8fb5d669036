//! `PageRank` power-iteration engine
//!
//! Based on Page et al. (1999) "The `PageRank` Citation Ranking: Bringing Order to the Web"
//!
//! # Algorithm
//!
//! Each iteration, given `old`:
//!
//! ```text
//! leaked = Σ old[v] for dangling v
//! leaked = leaked + (1 - leaked) * (1 - d)
//! new[v] = leaked / N + d * Σ old[u] / out_degree(u)     (u → v)
//! ```
//!
//! `leaked` folds the mass stranded on dangling nodes and the teleportation
//! complement into one scalar spread uniformly, so `Σ new = 1` after every
//! sweep. The loop stops when `‖new - old‖₂ <= epsilon` (if enabled) or when
//! the iteration ceiling is reached, and the final vector is renormalized to
//! remove floating-point drift.
//!
//! Arithmetic is `f32` except the norm accumulator, which is `f64`.
//!
//! [`PowerIteration`] owns that state machine; strategies only supply the
//! sweep (`new += d * M · old`).

use crate::config::{PageRankConfig, StopReason};
use crate::storage::{NodeId, SparseLayout};
use anyhow::Result;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Where a [`PowerIteration`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Uniform vector, no sweep yet
    Init,
    /// At least one sweep done, no stop condition met
    Iterating,
    /// Norm fell to epsilon
    Converged,
    /// Iteration ceiling reached
    MaxIterReached,
    /// Final vector rescaled to sum 1
    Normalized,
    /// Result handed out
    Done,
}

impl Phase {
    /// Whether a stop condition has been met
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        !matches!(self, Self::Init | Self::Iterating)
    }
}

/// Double buffer of rank vectors
///
/// `current` holds the last completed iteration, `next` is scratch for the
/// one in progress. [`RankBuffers::swap`] exchanges roles without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct RankBuffers {
    current: Vec<f32>,
    next: Vec<f32>,
}

impl RankBuffers {
    /// Both buffers filled with `1 / nodes_count`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform(nodes_count: usize) -> Self {
        let init = if nodes_count == 0 {
            0.0
        } else {
            1.0 / nodes_count as f32
        };
        Self {
            current: vec![init; nodes_count],
            next: vec![init; nodes_count],
        }
    }

    /// Last completed vector
    #[must_use]
    pub fn current(&self) -> &[f32] {
        &self.current
    }

    /// Read `current` while writing `next`
    pub fn split(&mut self) -> (&[f32], &mut [f32]) {
        (&self.current, &mut self.next)
    }

    /// Exchange the roles of the two buffers
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// Consume the buffers, keeping `current`
    #[must_use]
    pub fn into_current(self) -> Vec<f32> {
        self.current
    }
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult {
    /// Final rank of every node, summing to 1
    pub scores: Vec<f32>,
    /// Completed iterations
    pub iterations: usize,
    /// Which stop condition fired
    pub stop_reason: StopReason,
    /// `‖new - old‖₂` after each iteration
    pub residuals: Vec<f64>,
}

impl PageRankResult {
    /// Rank of `node`, if it exists
    #[must_use]
    pub fn score(&self, node: NodeId) -> Option<f32> {
        self.scores.get(node.0 as usize).copied()
    }

    /// Norm of the last iteration
    #[must_use]
    pub fn final_residual(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    /// Whether the convergence threshold was met
    #[must_use]
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }
}

/// Dangling mass of `old` plus the teleportation complement
#[must_use]
pub fn leaked_mass(old: &[f32], leaves: &[u32], damping: f32) -> f32 {
    let dangling: f32 = leaves.iter().map(|&v| old[v as usize]).sum();
    dangling + (1.0 - dangling) * (1.0 - damping)
}

/// Fill `new` with the uniform share of `leaked` (`total_nodes` is the whole graph)
#[allow(clippy::cast_precision_loss)]
pub fn seed(new: &mut [f32], leaked: f32, total_nodes: usize) {
    let share = leaked / total_nodes as f32;
    new.fill(share);
}

/// `‖a - b‖₂` accumulated in `f64`
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// `Σ (a - b)²` accumulated in `f64`
#[must_use]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

/// Divide every entry by the vector's sum
#[allow(clippy::cast_possible_truncation)]
pub fn normalize(scores: &mut [f32]) {
    let sum: f64 = scores.iter().map(|&x| f64::from(x)).sum();
    if sum > 0.0 {
        for x in scores.iter_mut() {
            *x = (f64::from(*x) / sum) as f32;
        }
    }
}

/// Power-method state machine over one graph
///
/// # Example
///
/// ```
/// use sparse_pagerank::{
///     AdjacencyIn, EdgeList, PageRankConfig, Phase, PowerIteration, SparseLayout,
/// };
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n1\t2\n2\t0\n").unwrap();
/// let layout = AdjacencyIn::from_edges(&edges).unwrap();
/// let config = PageRankConfig::default();
///
/// let mut engine = PowerIteration::new(layout.nodes_count(), layout.leaves(), &config).unwrap();
/// let phase = engine.run(|old, new| layout.accumulate(old, new, config.damping));
/// assert_eq!(phase, Phase::Converged);
///
/// let result = engine.finish();
/// assert!(result.scores.iter().all(|&r| (r - 1.0 / 3.0).abs() < 1e-6));
/// ```
#[derive(Debug)]
pub struct PowerIteration<'a> {
    config: &'a PageRankConfig,
    leaves: &'a [u32],
    buffers: RankBuffers,
    phase: Phase,
    iterations: usize,
    residuals: Vec<f64>,
}

impl<'a> PowerIteration<'a> {
    /// Start from the uniform vector
    ///
    /// # Errors
    ///
    /// Returns a configuration error from [`PageRankConfig::validate`]
    pub fn new(nodes_count: usize, leaves: &'a [u32], config: &'a PageRankConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            leaves,
            buffers: RankBuffers::uniform(nodes_count),
            // nothing to iterate on an empty graph
            phase: if nodes_count == 0 {
                Phase::Converged
            } else {
                Phase::Init
            },
            iterations: 0,
            residuals: Vec::new(),
        })
    }

    /// Current lifecycle phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed iterations
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Vector of the last completed iteration (not yet normalized)
    #[must_use]
    pub fn ranks(&self) -> &[f32] {
        self.buffers.current()
    }

    /// Run one iteration with `sweep` adding the damped contributions
    ///
    /// `sweep(old, new)` receives `new` already seeded with the leaked share
    /// and must add `damping * old[u] / out_degree[u]` for every edge
    /// `u → v` into `new[v]`. Does nothing once a stop condition is met.
    pub fn step<F>(&mut self, sweep: F) -> Phase
    where
        F: FnOnce(&[f32], &mut [f32]),
    {
        if self.phase.is_stopped() {
            return self.phase;
        }

        let (old, new) = self.buffers.split();
        let nodes_count = old.len();
        let leaked = leaked_mass(old, self.leaves, self.config.damping);
        seed(new, leaked, nodes_count);
        sweep(old, new);
        let norm = l2_distance(new, old);
        self.buffers.swap();

        self.iterations += 1;
        self.residuals.push(norm);
        debug!(
            "iteration {}: leaked {leaked:.6}, norm {norm:.3e}",
            self.iterations
        );

        self.phase = match self.config.stop_reason(self.iterations, norm) {
            Some(StopReason::Converged) => Phase::Converged,
            Some(StopReason::MaxIterations) => Phase::MaxIterReached,
            None => Phase::Iterating,
        };
        self.phase
    }

    /// Step until a stop condition is met
    pub fn run<F>(&mut self, mut sweep: F) -> Phase
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        while !self.phase.is_stopped() {
            self.step(&mut sweep);
        }
        self.phase
    }

    /// Normalize and hand out the result
    ///
    /// Normalizes whatever the last completed iteration produced, so it can
    /// also be used to stop early.
    #[must_use]
    pub fn finish(mut self) -> PageRankResult {
        let stop_reason = match self.phase {
            Phase::MaxIterReached => StopReason::MaxIterations,
            _ => StopReason::Converged,
        };
        let mut scores = self.buffers.into_current();
        normalize(&mut scores);
        self.phase = Phase::Normalized;
        debug!("normalized {} scores ({:?})", scores.len(), self.phase);
        self.phase = Phase::Done;

        PageRankResult {
            scores,
            iterations: self.iterations,
            stop_reason,
            residuals: self.residuals,
        }
    }
}

/// Log the end of a run
pub(crate) fn log_finished(
    strategy: &str,
    result: &PageRankResult,
    config: &PageRankConfig,
    elapsed: Duration,
) {
    info!(
        "pagerank[{strategy}] finished: {} iterations, {:?}, final norm {:.3e}, {:.2?}",
        result.iterations,
        result.stop_reason,
        result.final_residual().unwrap_or(0.0),
        elapsed
    );
    if config.check_convergence && result.stop_reason == StopReason::MaxIterations {
        warn!(
            "pagerank[{strategy}] hit the iteration ceiling ({}) before reaching epsilon {:.1e}",
            config.max_iterations, config.epsilon
        );
    }
}

/// Compute `PageRank` sequentially over any layout
///
/// This is the reference strategy every other one is checked against.
///
/// # Errors
///
/// Returns a configuration error if `config` is invalid
///
/// # Example
///
/// ```
/// use sparse_pagerank::{pagerank, CsrMatrix, EdgeList, NodeId, PageRankConfig};
///
/// // 0 → 1, 0 → 2, 0 → 3; nodes 1..3 are dangling
/// let edges = EdgeList::parse("4\t3\n0\t1\n0\t2\n0\t3\n").unwrap();
/// let csr = CsrMatrix::from_edges(&edges).unwrap();
///
/// let result = pagerank(&csr, &PageRankConfig::default()).unwrap();
/// assert!((result.scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
/// assert!(result.score(NodeId(1)).unwrap() > result.score(NodeId(0)).unwrap());
/// ```
pub fn pagerank<L>(layout: &L, config: &PageRankConfig) -> Result<PageRankResult>
where
    L: SparseLayout + ?Sized,
{
    let start = Instant::now();
    let mut engine = PowerIteration::new(layout.nodes_count(), layout.leaves(), config)?;
    engine.run(|old, new| layout.accumulate(old, new, config.damping));
    let result = engine.finish();
    log_finished(
        &format!("sequential/{}", layout.kind()),
        &result,
        config,
        start.elapsed(),
    );
    Ok(result)
}
