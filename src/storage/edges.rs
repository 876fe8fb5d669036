//! Edge ingestion
//!
//! Parses the edge-list text format into a contiguous pair buffer plus
//! per-node degree counts.
//!
//! # Format
//!
//! ```text
//! 4	3        <- nodes_count, edges_count
//! 0	1        <- tail, head (0-indexed)
//! 0	2
//! 0	3
//! ```
//!
//! Fields may be separated by any whitespace and blank lines are ignored.
//! Node ids outside `[0, nodes_count)` abort ingestion with
//! [`PageRankError::NodeOutOfRange`]; nothing is skipped silently.

use crate::error::PageRankError;
use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::Path;

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Directed edge list with degree counts
///
/// Built once per run and immutable afterwards. Layout builders borrow it and
/// it can be dropped as soon as the layout exists.
///
/// # Example
///
/// ```
/// use sparse_pagerank::{EdgeList, NodeId};
///
/// let edges = EdgeList::parse("3\t2\n0\t1\n1\t2\n").unwrap();
/// assert_eq!(edges.nodes_count(), 3);
/// assert_eq!(edges.out_degree(), &[1, 1, 0]);
/// assert_eq!(edges.leaves(), vec![2]);
///
/// let same = EdgeList::from_pairs(3, &[(NodeId(0), NodeId(1)), (NodeId(1), NodeId(2))]).unwrap();
/// assert_eq!(same.pairs(), edges.pairs());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList {
    nodes_count: usize,

    /// `(tail, head)` pairs in input order, one flat allocation
    pairs: Vec<[u32; 2]>,

    /// Length: `nodes_count`
    out_degree: Vec<u32>,

    /// Length: `nodes_count`
    in_degree: Vec<u32>,
}

impl EdgeList {
    /// Build from programmatic pairs, validating every id
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::NodeOutOfRange`] (with line 0) if an id is not below `nodes_count`
    pub fn from_pairs(nodes_count: usize, edges: &[(NodeId, NodeId)]) -> Result<Self> {
        let mut builder = EdgeListBuilder::new(nodes_count, edges.len());
        for &(tail, head) in edges {
            builder.push(0, i64::from(tail.0), i64::from(head.0))?;
        }
        Ok(builder.finish())
    }

    /// Reassemble from parts whose degrees were computed elsewhere
    ///
    /// The degrees are trusted here; layout builders re-verify them against
    /// the pairs and fail with [`PageRankError::InconsistentDegree`] on a mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the degree vectors are not `nodes_count` long or a
    /// pair references a node outside the graph
    pub fn from_raw_parts(
        nodes_count: usize,
        pairs: Vec<[u32; 2]>,
        out_degree: Vec<u32>,
        in_degree: Vec<u32>,
    ) -> Result<Self> {
        anyhow::ensure!(
            out_degree.len() == nodes_count && in_degree.len() == nodes_count,
            "degree vectors must have {nodes_count} entries (got {} and {})",
            out_degree.len(),
            in_degree.len()
        );
        if let Some(&[tail, head]) = pairs
            .iter()
            .find(|[t, h]| *t as usize >= nodes_count || *h as usize >= nodes_count)
        {
            let node = if tail as usize >= nodes_count { tail } else { head };
            return Err(PageRankError::NodeOutOfRange {
                line: 0,
                node: i64::from(node),
                nodes_count,
            }
            .into());
        }
        Ok(Self {
            nodes_count,
            pairs,
            out_degree,
            in_degree,
        })
    }

    /// Parse the textual edge-list format
    ///
    /// # Errors
    ///
    /// Returns an input error ([`PageRankError::MalformedHeader`],
    /// [`PageRankError::MalformedRecord`], [`PageRankError::NodeOutOfRange`],
    /// [`PageRankError::EdgeCountMismatch`])
    pub fn parse(text: &str) -> Result<Self> {
        parse_lines(text.lines().map(Ok::<_, std::io::Error>))
    }

    /// Parse from any buffered reader
    ///
    /// # Errors
    ///
    /// Same as [`EdgeList::parse`], plus I/O errors from the reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        parse_lines(reader.lines())
    }

    /// Number of nodes declared by the header
    #[must_use]
    pub const fn nodes_count(&self) -> usize {
        self.nodes_count
    }

    /// Number of edges
    #[must_use]
    pub fn edges_count(&self) -> usize {
        self.pairs.len()
    }

    /// `(tail, head)` pairs in input order
    #[must_use]
    pub fn pairs(&self) -> &[[u32; 2]] {
        &self.pairs
    }

    /// Out-degree per node
    #[must_use]
    pub fn out_degree(&self) -> &[u32] {
        &self.out_degree
    }

    /// In-degree per node
    #[must_use]
    pub fn in_degree(&self) -> &[u32] {
        &self.in_degree
    }

    /// Dangling nodes (out-degree 0), ascending
    #[must_use]
    pub fn leaves(&self) -> Vec<u32> {
        leaves_of(&self.out_degree)
    }

    /// Copy of the pairs sorted by head, ties broken by tail
    ///
    /// This is the row order of the column-stochastic matrix layouts.
    #[must_use]
    pub fn sorted_by_head(&self) -> Vec<[u32; 2]> {
        use rayon::slice::ParallelSliceMut;

        let mut sorted = self.pairs.clone();
        sorted.par_sort_unstable_by_key(|&[tail, head]| (head, tail));
        sorted
    }
}

/// Nodes with out-degree 0, ascending
#[allow(clippy::cast_possible_truncation)] // node ids are u32 by construction
pub(crate) fn leaves_of(out_degree: &[u32]) -> Vec<u32> {
    out_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(node, _)| node as u32)
        .collect()
}

/// Read and parse an edge-list file
///
/// # Errors
///
/// Returns [`PageRankError::UnreadableSource`] if the file cannot be read,
/// otherwise the errors of [`EdgeList::parse`]
pub async fn read_edge_list<P: AsRef<Path>>(path: P) -> Result<EdgeList> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PageRankError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        })?;
    EdgeList::parse(&text).with_context(|| format!("while parsing {}", path.display()))
}

/// Largest up-front pair reservation (8 MiB); longer lists grow on demand
const MAX_RESERVED_EDGES: usize = 1 << 20;

/// Accumulates validated pairs and degrees
struct EdgeListBuilder {
    nodes_count: usize,
    pairs: Vec<[u32; 2]>,
    out_degree: Vec<u32>,
    in_degree: Vec<u32>,
}

impl EdgeListBuilder {
    /// `edges_hint` comes from an untrusted header, so only part of it is
    /// reserved up front
    fn new(nodes_count: usize, edges_hint: usize) -> Self {
        Self {
            nodes_count,
            pairs: Vec::with_capacity(edges_hint.min(MAX_RESERVED_EDGES)),
            out_degree: vec![0; nodes_count],
            in_degree: vec![0; nodes_count],
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range-checked below
    fn push(&mut self, line: usize, tail: i64, head: i64) -> Result<()> {
        for node in [tail, head] {
            if node < 0 || node as u64 >= self.nodes_count as u64 {
                return Err(PageRankError::NodeOutOfRange {
                    line,
                    node,
                    nodes_count: self.nodes_count,
                }
                .into());
            }
        }
        let (tail, head) = (tail as u32, head as u32);
        self.out_degree[tail as usize] += 1;
        self.in_degree[head as usize] += 1;
        self.pairs.push([tail, head]);
        Ok(())
    }

    fn finish(self) -> EdgeList {
        EdgeList {
            nodes_count: self.nodes_count,
            pairs: self.pairs,
            out_degree: self.out_degree,
            in_degree: self.in_degree,
        }
    }
}

fn parse_lines<I, S, E>(lines: I) -> Result<EdgeList>
where
    I: IntoIterator<Item = std::result::Result<S, E>>,
    S: AsRef<str>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut lines = lines
        .into_iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line));

    // Header: first non-blank record
    let mut header = None;
    for (line_no, line) in lines.by_ref() {
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if !line.as_ref().trim().is_empty() {
            header = Some((line_no, line));
            break;
        }
    }
    let (header_line, header) = header.ok_or(PageRankError::MalformedHeader { line: 1 })?;
    let (nodes_count, declared) = parse_header(header.as_ref())
        .ok_or(PageRankError::MalformedHeader { line: header_line })?;

    let mut builder = EdgeListBuilder::new(nodes_count, declared);
    let mut found = 0_usize;
    for (line_no, line) in lines {
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        let record = line.as_ref().trim();
        if record.is_empty() {
            continue;
        }
        let (tail, head) = parse_pair::<i64>(record).ok_or_else(|| {
            PageRankError::MalformedRecord {
                line: line_no,
                content: record.to_string(),
            }
        })?;
        found += 1;
        if found <= declared {
            builder.push(line_no, tail, head)?;
        }
    }

    if found != declared {
        return Err(PageRankError::EdgeCountMismatch { declared, found }.into());
    }
    Ok(builder.finish())
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let (nodes_count, edges_count) = parse_pair::<usize>(line)?;
    // node ids are stored as u32
    (nodes_count as u64 <= u64::from(u32::MAX)).then_some((nodes_count, edges_count))
}

fn parse_pair<T: std::str::FromStr>(line: &str) -> Option<(T, T)> {
    let mut fields = line.split_whitespace();
    let first = fields.next()?.parse().ok()?;
    let second = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(err: &anyhow::Error) -> &PageRankError {
        err.downcast_ref::<PageRankError>()
            .expect("expected a PageRankError")
    }

    #[test]
    fn test_parse_simple() {
        let edges = EdgeList::parse("4\t3\n0\t1\n0\t2\n0\t3\n").unwrap();

        assert_eq!(edges.nodes_count(), 4);
        assert_eq!(edges.edges_count(), 3);
        assert_eq!(edges.pairs(), &[[0, 1], [0, 2], [0, 3]]);
        assert_eq!(edges.out_degree(), &[3, 0, 0, 0]);
        assert_eq!(edges.in_degree(), &[0, 1, 1, 1]);
        assert_eq!(edges.leaves(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_whitespace_and_blank_lines() {
        let edges = EdgeList::parse("\n3 2\n\n0   1\r\n 1\t2 \n\n").unwrap();
        assert_eq!(edges.pairs(), &[[0, 1], [1, 2]]);
    }

    #[test]
    fn test_malformed_header() {
        for text in ["", "three\t2\n", "3\n0\t1\n", "3\t2\t1\n", "-3\t2\n"] {
            let err = EdgeList::parse(text).unwrap_err();
            assert!(
                matches!(category(&err), PageRankError::MalformedHeader { .. }),
                "{text:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_malformed_record() {
        let err = EdgeList::parse("3\t2\n0\t1\n1\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::MalformedRecord { line: 3, .. }
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = EdgeList::parse("3\t2\n0\t1\n1\t3\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::NodeOutOfRange {
                line: 3,
                node: 3,
                nodes_count: 3
            }
        ));

        let err = EdgeList::parse("3\t1\n-1\t0\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::NodeOutOfRange { node: -1, .. }
        ));
    }

    #[test]
    fn test_edge_count_mismatch() {
        let err = EdgeList::parse("3\t3\n0\t1\n1\t2\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::EdgeCountMismatch {
                declared: 3,
                found: 2
            }
        ));

        let err = EdgeList::parse("3\t1\n0\t1\n1\t2\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::EdgeCountMismatch {
                declared: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_huge_declared_count_is_a_mismatch() {
        let err = EdgeList::parse("3\t100000000000000\n0\t1\n").unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::EdgeCountMismatch {
                declared: 100_000_000_000_000,
                found: 1
            }
        ));
    }

    #[test]
    fn test_from_reader() {
        let text = "2\t2\n0\t1\n1\t0\n";
        let edges = EdgeList::from_reader(std::io::Cursor::new(text)).unwrap();
        assert_eq!(edges, EdgeList::parse(text).unwrap());
    }

    #[test]
    fn test_from_pairs_validates() {
        let err = EdgeList::from_pairs(2, &[(NodeId(0), NodeId(2))]).unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::NodeOutOfRange { line: 0, node: 2, .. }
        ));
    }

    #[test]
    fn test_from_raw_parts_checks_lengths() {
        assert!(EdgeList::from_raw_parts(2, vec![[0, 1]], vec![1], vec![0, 1]).is_err());
        assert!(EdgeList::from_raw_parts(2, vec![[0, 5]], vec![1, 0], vec![0, 1]).is_err());
        let edges = EdgeList::from_raw_parts(2, vec![[0, 1]], vec![1, 0], vec![0, 1]).unwrap();
        assert_eq!(edges.edges_count(), 1);
    }

    #[test]
    fn test_sorted_by_head() {
        let edges = EdgeList::from_pairs(
            3,
            &[
                (NodeId(2), NodeId(1)),
                (NodeId(0), NodeId(2)),
                (NodeId(0), NodeId(1)),
                (NodeId(1), NodeId(0)),
            ],
        )
        .unwrap();
        assert_eq!(
            edges.sorted_by_head(),
            vec![[1, 0], [0, 1], [2, 1], [0, 2]]
        );
        // input order untouched
        assert_eq!(edges.pairs()[0], [2, 1]);
    }

    #[tokio::test]
    async fn test_read_edge_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        tokio::fs::write(&path, "3\t3\n0\t1\n1\t2\n2\t0\n")
            .await
            .unwrap();

        let edges = read_edge_list(&path).await.unwrap();
        assert_eq!(edges.edges_count(), 3);
        assert!(edges.leaves().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_edge_list(dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(
            category(&err),
            PageRankError::UnreadableSource { .. }
        ));
    }
}
