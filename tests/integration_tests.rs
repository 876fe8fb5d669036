//! Integration tests for sparse-pagerank
//!
//! End-to-end scenarios: edge-list files in, rank vectors out, across every
//! layout and the input errors a user can hit.

use sparse_pagerank::{
    pagerank, read_edge_list, read_ranks, write_ranks, AdjacencyIn, CsrMatrix, EdgeList,
    GraphLayout, JdsMatrix, LayoutKind, LayoutOptions, LocalCluster, PageRankConfig,
    PageRankError, StopReason,
};
use tempfile::tempdir;

/// Small web-like graph with two dangling pages (5, 6) and a self-loop on 3
const WEB: &str = "7\t10\n0\t1\n0\t2\n1\t2\n2\t0\n2\t3\n3\t4\n4\t0\n4\t5\n1\t6\n3\t3\n";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_close(left: &[f32], right: &[f32], tolerance: f32) {
    assert_eq!(left.len(), right.len());
    for (i, (a, b)) in left.iter().zip(right).enumerate() {
        assert!((a - b).abs() < tolerance, "node {i}: {a} vs {b}");
    }
}

#[tokio::test]
async fn test_file_to_ranks_on_every_layout() {
    init_logging();
    let dir = tempdir().unwrap();
    let input = dir.path().join("web.tsv");
    tokio::fs::write(&input, WEB).await.unwrap();

    let edges = read_edge_list(&input).await.unwrap();
    assert_eq!(edges.nodes_count(), 7);
    assert_eq!(edges.edges_count(), 10);

    let config = PageRankConfig::default();
    let reference = pagerank(&CsrMatrix::from_edges(&edges).unwrap(), &config).unwrap();
    assert_eq!(reference.stop_reason, StopReason::Converged);

    for kind in LayoutKind::ALL {
        let layout = GraphLayout::build(kind, &edges, &LayoutOptions::default()).unwrap();
        let result = pagerank(&layout, &config).unwrap();
        assert_close(&result.scores, &reference.scores, 1e-6);
        assert!((result.scores.iter().sum::<f32>() - 1.0).abs() < 1e-5, "{kind}");
    }

    let output = dir.path().join("ranks.txt");
    write_ranks(&output, &reference.scores).await.unwrap();
    let text = tokio::fs::read_to_string(&output).await.unwrap();
    assert_eq!(text.lines().count(), 7);

    let loaded = read_ranks(&output).await.unwrap();
    assert_close(&loaded, &reference.scores, 1e-9);
}

#[test]
fn test_star_graph() {
    // hub 0 links to three dangling leaves
    let edges = EdgeList::parse("4\t3\n0\t1\n0\t2\n0\t3\n").unwrap();
    let layout = CsrMatrix::from_edges(&edges).unwrap();
    let result = pagerank(&layout, &PageRankConfig::default()).unwrap();

    let s = &result.scores;
    assert!((s[1] - s[2]).abs() < 1e-7 && (s[2] - s[3]).abs() < 1e-7);
    assert!(s[1] > s[0], "leaves collect the hub's rank");
    assert!((s.iter().sum::<f32>() - 1.0).abs() < 1e-6);
}

#[test]
fn test_cycle_is_uniform() {
    let edges = EdgeList::parse("5\t5\n0\t1\n1\t2\n2\t3\n3\t4\n4\t0\n").unwrap();
    let layout = AdjacencyIn::from_edges(&edges).unwrap();
    let result = pagerank(&layout, &PageRankConfig::default()).unwrap();

    assert_eq!(result.iterations, 1);
    for score in &result.scores {
        assert!((score - 0.2).abs() < 1e-6);
    }
}

#[test]
fn test_single_node_without_edges() {
    let edges = EdgeList::parse("1\t0\n").unwrap();
    let layout = CsrMatrix::from_edges(&edges).unwrap();
    let result = pagerank(&layout, &PageRankConfig::default()).unwrap();
    assert_eq!(result.scores, vec![1.0]);
}

#[test]
fn test_jds_with_empty_buckets_matches_csr() {
    // row lengths 1 and 4 only: most of the 8 requested buckets stay empty
    let edges = EdgeList::parse("6\t7\n0\t5\n1\t5\n2\t5\n3\t5\n5\t0\n5\t1\n4\t2\n").unwrap();
    let csr = CsrMatrix::from_edges(&edges).unwrap();
    let jds = JdsMatrix::from_csr(&csr, 8).unwrap();

    assert_eq!(jds.num_pieces(), 2);
    let config = PageRankConfig::default();
    assert_close(
        &pagerank(&jds, &config).unwrap().scores,
        &pagerank(&csr, &config).unwrap().scores,
        1e-6,
    );
}

#[test]
fn test_distributed_matches_sequential() {
    init_logging();
    let edges = EdgeList::parse(WEB).unwrap();
    let layout = AdjacencyIn::from_edges(&edges).unwrap();
    let config = PageRankConfig::default();

    let sequential = pagerank(&layout, &config).unwrap();
    let distributed = LocalCluster::new(4)
        .unwrap()
        .run_pagerank(&layout, &config)
        .unwrap();

    assert_eq!(distributed.iterations, sequential.iterations);
    assert_close(&distributed.scores, &sequential.scores, 1e-6);
}

#[tokio::test]
async fn test_missing_file() {
    let dir = tempdir().unwrap();
    let err = read_edge_list(dir.path().join("absent.tsv")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PageRankError>(),
        Some(PageRankError::UnreadableSource { .. })
    ));
}

#[test]
fn test_input_errors() {
    let category = |text: &str| {
        let err = EdgeList::parse(text).unwrap_err();
        match err.downcast_ref::<PageRankError>() {
            Some(PageRankError::MalformedHeader { .. }) => "header",
            Some(PageRankError::MalformedRecord { .. }) => "record",
            Some(PageRankError::NodeOutOfRange { .. }) => "range",
            Some(PageRankError::EdgeCountMismatch { .. }) => "count",
            other => panic!("unexpected error {other:?} for {text:?}"),
        }
    };

    assert_eq!(category(""), "header");
    assert_eq!(category("three\t1\n"), "header");
    assert_eq!(category("3\t1\n0\tx\n"), "record");
    assert_eq!(category("3\t1\n0\t3\n"), "range");
    assert_eq!(category("3\t1\n-1\t0\n"), "range");
    assert_eq!(category("3\t2\n0\t1\n"), "count");
    assert_eq!(category("3\t1\n0\t1\n1\t2\n"), "count");
    assert_eq!(category("3\t100000000000000\n0\t1\n"), "count");
}

#[test]
fn test_configuration_errors() {
    let edges = EdgeList::parse(WEB).unwrap();
    let csr = CsrMatrix::from_edges(&edges).unwrap();

    let no_stop = PageRankConfig::default()
        .with_convergence_check(false)
        .with_max_iterations(0);
    let err = pagerank(&csr, &no_stop).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PageRankError>(),
        Some(PageRankError::NoStopCondition)
    ));

    let err = JdsMatrix::from_csr(&csr, 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PageRankError>(),
        Some(PageRankError::InvalidPieceCount)
    ));
}

#[cfg(feature = "storage")]
#[tokio::test]
async fn test_parquet_persistence() {
    use sparse_pagerank::{read_ranks_parquet, write_ranks_parquet};

    let dir = tempdir().unwrap();
    let base = dir.path().join("web");

    let edges = EdgeList::parse(WEB).unwrap();
    edges.write_parquet(&base).await.unwrap();

    // Verify files exist
    assert!(std::path::Path::new(&format!("{}_edges.parquet", base.display())).exists());
    assert!(std::path::Path::new(&format!("{}_nodes.parquet", base.display())).exists());

    let loaded = EdgeList::read_parquet(&base).await.unwrap();
    assert_eq!(loaded, edges);

    let layout = CsrMatrix::from_edges(&loaded).unwrap();
    let result = pagerank(&layout, &PageRankConfig::default()).unwrap();
    write_ranks_parquet(&base, &result.scores).await.unwrap();
    assert_eq!(read_ranks_parquet(&base).await.unwrap(), result.scores);
}
