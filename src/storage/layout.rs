//! Layout abstraction shared by every strategy
//!
//! The power-iteration engine only needs three things from a layout: its
//! size, its dangling set and one damped sweep `new += damping * M · old`.
//! [`SparseLayout`] captures exactly that, so the engine is written once and
//! every representation plugs into it.

use super::adjacency::{AdjacencyIn, AdjacencyOut};
use super::csr::CsrMatrix;
use super::edges::EdgeList;
use super::ell::EllMatrix;
use super::jds::JdsMatrix;
use crate::config::LayoutOptions;
use anyhow::Result;
use std::fmt;
use std::str::FromStr;

/// Which representation a layout uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// Successor lists (push-style)
    AdjacencyOut,
    /// Predecessor lists (pull-style)
    AdjacencyIn,
    /// Compressed sparse rows
    Csr,
    /// Fixed-width column-major rows
    Ell,
    /// Length-bucketed ELL
    Jds,
}

impl LayoutKind {
    /// All kinds, in build-cost order
    pub const ALL: [Self; 5] = [
        Self::AdjacencyOut,
        Self::AdjacencyIn,
        Self::Csr,
        Self::Ell,
        Self::Jds,
    ];

    /// Short lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AdjacencyOut => "adjacency-out",
            Self::AdjacencyIn => "adjacency-in",
            Self::Csr => "csr",
            Self::Ell => "ell",
            Self::Jds => "jds",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown layout `{s}` (expected adjacency-out, adjacency-in, csr, ell or jds)"
                )
            })
    }
}

/// A read-only sparse representation of the transition matrix
///
/// Implementations never mutate themselves during iteration; `Sync` lets the
/// parallel strategy share one layout across threads.
pub trait SparseLayout: Sync {
    /// Representation used
    fn kind(&self) -> LayoutKind;

    /// Number of nodes (rows)
    fn nodes_count(&self) -> usize;

    /// Number of stored edges (padding excluded)
    fn edges_count(&self) -> usize;

    /// Dangling nodes (out-degree 0), ascending
    fn leaves(&self) -> &[u32];

    /// Add `damping * old[u] / out_degree[u]` to `new[v]` for every edge `u → v`
    fn accumulate(&self, old: &[f32], new: &mut [f32], damping: f32);
}

/// Layouts whose rows can be computed independently of each other
pub trait PullRows: SparseLayout {
    /// `seed` plus the damped contributions flowing into `row`
    fn gather_row(&self, row: usize, old: &[f32], damping: f32, seed: f32) -> f32;
}

/// Layout chosen at runtime
///
/// # Example
///
/// ```
/// use sparse_pagerank::{EdgeList, GraphLayout, LayoutKind, LayoutOptions, SparseLayout};
///
/// let edges = EdgeList::parse("3\t3\n0\t1\n1\t2\n2\t0\n").unwrap();
/// for kind in LayoutKind::ALL {
///     let layout = GraphLayout::build(kind, &edges, &LayoutOptions::default()).unwrap();
///     assert_eq!(layout.edges_count(), 3);
///     assert_eq!(layout.kind(), kind);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum GraphLayout {
    /// Successor lists
    AdjacencyOut(AdjacencyOut),
    /// Predecessor lists
    AdjacencyIn(AdjacencyIn),
    /// Compressed sparse rows
    Csr(CsrMatrix),
    /// Fixed-width rows
    Ell(EllMatrix),
    /// Length-bucketed rows
    Jds(JdsMatrix),
}

impl GraphLayout {
    /// Build the requested representation
    ///
    /// # Errors
    ///
    /// Propagates the builder's consistency or configuration error
    pub fn build(kind: LayoutKind, edges: &EdgeList, options: &LayoutOptions) -> Result<Self> {
        let start = std::time::Instant::now();
        let layout = match kind {
            LayoutKind::AdjacencyOut => Self::AdjacencyOut(AdjacencyOut::from_edges(edges)?),
            LayoutKind::AdjacencyIn => Self::AdjacencyIn(AdjacencyIn::from_edges(edges)?),
            LayoutKind::Csr => Self::Csr(CsrMatrix::from_edges(edges)?),
            LayoutKind::Ell => Self::Ell(EllMatrix::from_edges(edges)?),
            LayoutKind::Jds => Self::Jds(JdsMatrix::from_edges(edges, options.jds_pieces)?),
        };
        log::info!(
            "built {kind} layout: {} nodes, {} edges, {} leaves in {:.2?}",
            layout.nodes_count(),
            layout.edges_count(),
            layout.leaves().len(),
            start.elapsed()
        );
        Ok(layout)
    }

    fn inner(&self) -> &dyn SparseLayout {
        match self {
            Self::AdjacencyOut(l) => l,
            Self::AdjacencyIn(l) => l,
            Self::Csr(l) => l,
            Self::Ell(l) => l,
            Self::Jds(l) => l,
        }
    }
}

impl SparseLayout for GraphLayout {
    fn kind(&self) -> LayoutKind {
        self.inner().kind()
    }

    fn nodes_count(&self) -> usize {
        self.inner().nodes_count()
    }

    fn edges_count(&self) -> usize {
        self.inner().edges_count()
    }

    fn leaves(&self) -> &[u32] {
        self.inner().leaves()
    }

    fn accumulate(&self, old: &[f32], new: &mut [f32], damping: f32) {
        self.inner().accumulate(old, new, damping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in LayoutKind::ALL {
            assert_eq!(kind.to_string().parse::<LayoutKind>().unwrap(), kind);
        }
        assert_eq!("CSR".parse::<LayoutKind>().unwrap(), LayoutKind::Csr);
        assert!("coo".parse::<LayoutKind>().is_err());
    }

    #[test]
    fn test_all_layouts_same_sweep() {
        let edges = EdgeList::parse("5\t7\n0\t1\n0\t2\n1\t2\n2\t0\n3\t2\n3\t4\n4\t4\n").unwrap();
        let old = [0.3, 0.1, 0.25, 0.2, 0.15];
        let options = LayoutOptions { jds_pieces: 2 };

        let mut reference = vec![0.0; 5];
        GraphLayout::build(LayoutKind::AdjacencyIn, &edges, &options)
            .unwrap()
            .accumulate(&old, &mut reference, 0.85);

        for kind in LayoutKind::ALL {
            let layout = GraphLayout::build(kind, &edges, &options).unwrap();
            assert_eq!(layout.nodes_count(), 5);
            assert_eq!(layout.edges_count(), 7);
            assert_eq!(layout.leaves(), &[] as &[u32]);

            let mut new = vec![0.0; 5];
            layout.accumulate(&old, &mut new, 0.85);
            for (a, b) in new.iter().zip(&reference) {
                assert!((a - b).abs() < 1e-6, "{kind}: {new:?} vs {reference:?}");
            }
        }
    }
}
