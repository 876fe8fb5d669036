//! Cross-strategy comparison of rank vectors
//!
//! Every strategy computes the same fixed point, so two result vectors for
//! the same graph and configuration should agree element-wise within a small
//! absolute tolerance.

use anyhow::Result;

/// Default element-wise tolerance between strategies
pub const DEFAULT_TOLERANCE: f32 = 1e-6;

/// One index where two vectors disagree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inconsistency {
    /// Node id
    pub index: usize,
    /// Value in the first vector
    pub left: f32,
    /// Value in the second vector
    pub right: f32,
}

impl Inconsistency {
    /// Absolute difference
    #[must_use]
    pub fn difference(&self) -> f32 {
        (self.left - self.right).abs()
    }
}

/// Every index where `|left - right| > tolerance`
///
/// # Errors
///
/// Returns an error if the vectors have different lengths
///
/// # Example
///
/// ```
/// use sparse_pagerank::compare_ranks;
///
/// let bad = compare_ranks(&[0.5, 0.5], &[0.5, 0.4], 1e-6).unwrap();
/// assert_eq!(bad.len(), 1);
/// assert_eq!(bad[0].index, 1);
/// ```
pub fn compare_ranks(left: &[f32], right: &[f32], tolerance: f32) -> Result<Vec<Inconsistency>> {
    anyhow::ensure!(
        left.len() == right.len(),
        "rank vectors differ in length ({} vs {})",
        left.len(),
        right.len()
    );
    Ok(left
        .iter()
        .zip(right)
        .enumerate()
        .filter(|(_, (l, r))| (*l - *r).abs() > tolerance || l.is_nan() != r.is_nan())
        .map(|(index, (&left, &right))| Inconsistency { index, left, right })
        .collect())
}

/// Iterations whose norm rose above the previous one
///
/// On a strongly connected graph without dangling nodes the norm should
/// trend down; isolated rises are floating-point noise and are only reported.
#[must_use]
pub fn non_monotone_steps(residuals: &[f64]) -> Vec<usize> {
    residuals
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0])
        .map(|(i, _)| i + 1)
        .collect()
}
