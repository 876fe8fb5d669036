//! Run configuration
//!
//! All tunables are plain immutable values passed by reference into the
//! engine and every strategy. Defaults follow the reference benchmark setup:
//! damping 0.85, epsilon 2e-7 (L2 norm of successive differences) and an
//! iteration ceiling of 200.

use crate::error::PageRankError;
use anyhow::Result;

/// Default damping factor (probability of following an outgoing edge)
pub const DEFAULT_DAMPING: f32 = 0.85;

/// Default convergence threshold on the L2 norm of `new - old`
pub const DEFAULT_EPSILON: f64 = 2e-7;

/// Default iteration ceiling (0 disables the ceiling)
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Default number of threads cooperating on one CSR row on the GPU
pub const DEFAULT_WARP_SIZE: u32 = 16;

/// Default GPU workgroup size
pub const DEFAULT_WORKGROUP_SIZE: u32 = 256;

/// Default number of JDS length buckets
pub const DEFAULT_JDS_PIECES: usize = 8;

/// Why a power iteration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The L2 norm of successive differences fell to `epsilon` or below
    Converged,
    /// The iteration ceiling was reached first
    MaxIterations,
}

/// Power-method parameters shared by every strategy
///
/// # Example
///
/// ```
/// use sparse_pagerank::PageRankConfig;
///
/// let config = PageRankConfig::default()
///     .with_damping(0.9)
///     .with_max_iterations(50);
/// assert!(config.validate().is_ok());
///
/// let invalid = config.with_convergence_check(false).with_max_iterations(0);
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    /// Damping factor in `[0, 1]`
    pub damping: f32,
    /// Stop once the L2 norm of `new - old` is at most `epsilon`
    pub check_convergence: bool,
    /// Convergence threshold
    pub epsilon: f64,
    /// Hard iteration cap, 0 = unbounded
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            check_convergence: true,
            epsilon: DEFAULT_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl PageRankConfig {
    /// Set the damping factor
    #[must_use]
    pub const fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Enable or disable the convergence check
    #[must_use]
    pub const fn with_convergence_check(mut self, enabled: bool) -> Self {
        self.check_convergence = enabled;
        self
    }

    /// Set the convergence threshold
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the iteration ceiling (0 = unbounded)
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Reject unusable configurations before any iteration runs
    ///
    /// # Errors
    ///
    /// - [`PageRankError::NoStopCondition`] if both stop conditions are disabled
    /// - [`PageRankError::InvalidDamping`] if damping is outside `[0, 1]`
    /// - [`PageRankError::InvalidEpsilon`] if convergence checking is on with a
    ///   non-positive epsilon
    pub fn validate(&self) -> Result<()> {
        if !self.check_convergence && self.max_iterations == 0 {
            return Err(PageRankError::NoStopCondition.into());
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(PageRankError::InvalidDamping(self.damping).into());
        }
        if self.check_convergence && !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(PageRankError::InvalidEpsilon(self.epsilon).into());
        }
        Ok(())
    }

    /// Stop rule evaluated once per completed iteration
    ///
    /// `iterations` counts completed iterations, `norm` is the L2 norm of the
    /// last `new - old` difference.
    #[must_use]
    pub fn stop_reason(&self, iterations: usize, norm: f64) -> Option<StopReason> {
        if self.check_convergence && norm <= self.epsilon {
            Some(StopReason::Converged)
        } else if self.max_iterations > 0 && iterations >= self.max_iterations {
            Some(StopReason::MaxIterations)
        } else {
            None
        }
    }
}

/// Launch sizing for the GPU strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuConfig {
    /// Threads cooperating on one CSR row
    pub warp_size: u32,
    /// Threads per workgroup (also the shared-memory reduction width)
    pub workgroup_size: u32,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            warp_size: DEFAULT_WARP_SIZE,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

impl GpuConfig {
    /// Check that both sizes are powers of two and a warp fits in a workgroup
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InvalidWorkgroup`] otherwise
    pub fn validate(&self) -> Result<()> {
        let ok = self.warp_size.is_power_of_two()
            && self.workgroup_size.is_power_of_two()
            && self.warp_size <= self.workgroup_size;
        if ok {
            Ok(())
        } else {
            Err(PageRankError::InvalidWorkgroup {
                warp_size: self.warp_size,
                workgroup_size: self.workgroup_size,
            }
            .into())
        }
    }
}

/// Layout construction options
///
/// `jds_pieces` is the requested number of row-length buckets. Each piece is
/// padded to its own longest row, so too few pieces on a skewed degree
/// distribution costs memory (every row in a wide bucket pays for the
/// widest one) rather than correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Requested JDS bucket count (empty buckets are dropped)
    pub jds_pieces: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            jds_pieces: DEFAULT_JDS_PIECES,
        }
    }
}
