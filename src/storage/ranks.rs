//! Rank vector text format
//!
//! One line per node in node-id order, fixed-point with 12 fractional
//! digits:
//!
//! ```text
//! 0.333333343267
//! 0.333333343267
//! 0.333333343267
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Render scores in the result format
#[must_use]
pub fn format_ranks(scores: &[f32]) -> String {
    let mut out = String::with_capacity(scores.len() * 16);
    for score in scores {
        out.push_str(&format!("{score:.12}\n"));
    }
    out
}

/// Parse the result format back into scores
///
/// # Errors
///
/// Returns an error naming the first line that is not a number
pub fn parse_ranks(text: &str) -> Result<Vec<f32>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            line.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid rank on line {}: `{line}`", idx + 1))
        })
        .collect()
}

/// Write scores to `path`, replacing any existing file
///
/// # Errors
///
/// Returns an error if the file cannot be written
pub async fn write_ranks<P: AsRef<Path>>(path: P, scores: &[f32]) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, format_ranks(scores))
        .await
        .with_context(|| format!("Failed to write ranks to {}", path.display()))
}

/// Read scores written by [`write_ranks`]
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub async fn read_ranks<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read ranks from {}", path.display()))?;
    parse_ranks(&text)
}
