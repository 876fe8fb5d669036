//! Property-based tests for sparse-pagerank
//!
//! Verifies layout invariants and iteration properties hold for arbitrary graphs

use proptest::prelude::*;
use sparse_pagerank::{
    compare_ranks, pagerank, row_range, AdjacencyIn, AdjacencyOut, CsrMatrix, EdgeList,
    EllMatrix, GraphLayout, JdsMatrix, LayoutKind, LayoutOptions, LocalCluster, NodeId,
    PageRankConfig, ParallelPageRank, PowerIteration, SparseLayout, DEFAULT_TOLERANCE,
};

/// Arbitrary graph with `1..max_nodes` nodes and up to `max_edges` edges
/// (duplicates and self-loops included)
fn prop_graph(max_nodes: u32, max_edges: usize) -> impl Strategy<Value = EdgeList> {
    (1..max_nodes).prop_flat_map(move |n| {
        prop::collection::vec((0..n, 0..n), 0..max_edges).prop_map(move |pairs| {
            let pairs: Vec<(NodeId, NodeId)> = pairs
                .into_iter()
                .map(|(tail, head)| (NodeId(tail), NodeId(head)))
                .collect();
            EdgeList::from_pairs(n as usize, &pairs).unwrap()
        })
    })
}

// Property: CSR rows hold the predecessors weighted by 1 / out_degree
proptest! {
    #[test]
    fn prop_csr_valid(edges in prop_graph(40, 150)) {
        let csr = CsrMatrix::from_edges(&edges).unwrap();
        let (row_offsets, col_indices, values) = csr.csr_components();

        // Invariant 1: row_offsets is monotonically increasing
        for pair in row_offsets.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }

        // Invariant 2: last row_offset == edges_count
        prop_assert_eq!(*row_offsets.last().unwrap() as usize, edges.edges_count());
        prop_assert_eq!(col_indices.len(), values.len());

        // Invariant 3: row length == in-degree, value == 1 / out_degree(column)
        for row in 0..edges.nodes_count() {
            prop_assert_eq!(csr.row_len(row), edges.in_degree()[row] as usize);
            let (cols, vals) = csr.row(row);
            for (&col, &value) in cols.iter().zip(vals) {
                let expected = 1.0 / edges.out_degree()[col as usize] as f32;
                prop_assert!((value - expected).abs() < f32::EPSILON);
            }
        }
    }
}

// Property: ELL keeps each CSR row in its leading slots and pads with zeros
proptest! {
    #[test]
    fn prop_ell_matches_csr(edges in prop_graph(40, 150)) {
        let csr = CsrMatrix::from_edges(&edges).unwrap();
        let ell = EllMatrix::from_csr(&csr).unwrap();

        prop_assert_eq!(ell.width(), csr.max_row_len());
        prop_assert_eq!(ell.padding(), ell.width() * edges.nodes_count() - edges.edges_count());

        for row in 0..edges.nodes_count() {
            let (cols, vals) = csr.row(row);
            for k in 0..ell.width() {
                let (col, value) = ell.slot(row, k);
                if k < cols.len() {
                    prop_assert_eq!(col, cols[k]);
                    prop_assert_eq!(value, vals[k]);
                } else {
                    prop_assert_eq!(value, 0.0);
                }
            }
        }
    }
}

// Property: every stored row lands in exactly one JDS piece wide enough for it
proptest! {
    #[test]
    fn prop_jds_partitions_rows(edges in prop_graph(60, 200), requested in 1usize..12) {
        let csr = CsrMatrix::from_edges(&edges).unwrap();
        let jds = JdsMatrix::from_csr(&csr, requested).unwrap();

        prop_assert!(jds.num_pieces() <= requested);
        let mut seen = vec![0_u32; edges.nodes_count()];
        let mut nonzeros = 0;
        for piece in jds.pieces() {
            prop_assert!(piece.num_rows() > 0);
            nonzeros += piece.num_nonzeros();
            for &row in piece.row_ind() {
                seen[row as usize] += 1;
                prop_assert!(csr.row_len(row as usize) <= piece.width());
            }
        }
        prop_assert_eq!(nonzeros, edges.edges_count());

        for row in 0..edges.nodes_count() {
            let stored = csr.row_len(row) > 0;
            prop_assert_eq!(seen[row], u32::from(stored));
            prop_assert_eq!(jds.dangling()[row], !stored);
        }
    }
}

// Property: adjacency lists agree with the degree counts
proptest! {
    #[test]
    fn prop_adjacency_degrees(edges in prop_graph(40, 150)) {
        let out = AdjacencyOut::from_edges(&edges).unwrap();
        let inn = AdjacencyIn::from_edges(&edges).unwrap();

        for node in 0..edges.nodes_count() {
            prop_assert_eq!(out.successors(node).len(), edges.out_degree()[node] as usize);
            prop_assert_eq!(inn.predecessors(node).len(), edges.in_degree()[node] as usize);
        }
        let leaves = edges.leaves();
        prop_assert_eq!(out.leaves(), leaves.as_slice());
        prop_assert_eq!(inn.leaves(), leaves.as_slice());
    }
}

// Property: the unnormalized vector keeps summing to one after every iteration
proptest! {
    #[test]
    fn prop_mass_conservation(edges in prop_graph(50, 200)) {
        let layout = AdjacencyIn::from_edges(&edges).unwrap();
        let config = PageRankConfig::default().with_max_iterations(25);
        let mut engine =
            PowerIteration::new(layout.nodes_count(), layout.leaves(), &config).unwrap();

        while !engine.phase().is_stopped() {
            engine.step(|old, new| layout.accumulate(old, new, config.damping));
            let sum: f64 = engine.ranks().iter().map(|&r| f64::from(r)).sum();
            prop_assert!(
                (sum - 1.0).abs() < 1e-4,
                "sum {} after {} iterations",
                sum,
                engine.iterations()
            );
        }
    }
}

// Property: every layout and every CPU strategy produces the same ranks
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_strategies_agree(edges in prop_graph(50, 200), world_size in 1usize..5) {
        let config = PageRankConfig::default();
        let reference = pagerank(&CsrMatrix::from_edges(&edges).unwrap(), &config).unwrap();
        let agrees = |label: &str, scores: &[f32]| -> Result<(), TestCaseError> {
            let mismatches = compare_ranks(scores, &reference.scores, DEFAULT_TOLERANCE).unwrap();
            prop_assert!(mismatches.is_empty(), "{}: {:?}", label, mismatches);
            Ok(())
        };

        for kind in LayoutKind::ALL {
            let layout = GraphLayout::build(kind, &edges, &LayoutOptions::default()).unwrap();
            agrees(kind.name(), &pagerank(&layout, &config).unwrap().scores)?;
        }

        let adj = AdjacencyIn::from_edges(&edges).unwrap();
        let parallel = ParallelPageRank::default()
            .with_min_rows_per_task(4)
            .run(&adj, &config)
            .unwrap();
        agrees("parallel", &parallel.scores)?;

        let ell = EllMatrix::from_edges(&edges).unwrap();
        let parallel_ell = ParallelPageRank::default()
            .with_min_rows_per_task(4)
            .run(&ell, &config)
            .unwrap();
        agrees("parallel/ell", &parallel_ell.scores)?;

        let distributed = LocalCluster::new(world_size)
            .unwrap()
            .run_pagerank(&adj, &config)
            .unwrap();
        agrees("distributed", &distributed.scores)?;
    }
}

// Property: the parallel pull sweep is bit-identical to the sequential one
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_parallel_bit_identical(edges in prop_graph(80, 300)) {
        let layout = AdjacencyIn::from_edges(&edges).unwrap();
        let config = PageRankConfig::default();

        let sequential = pagerank(&layout, &config).unwrap();
        let parallel = ParallelPageRank::default()
            .with_min_rows_per_task(1)
            .run(&layout, &config)
            .unwrap();
        prop_assert_eq!(parallel.scores, sequential.scores);
    }
}

// Property: row ranges tile 0..n
proptest! {
    #[test]
    fn prop_row_ranges_tile(nodes in 0usize..10_000, world in 1usize..64) {
        let mut next = 0;
        for rank in 0..world {
            let range = row_range(rank, world, nodes);
            prop_assert_eq!(range.start, next);
            prop_assert!(range.len() <= nodes / world + 1);
            next = range.end;
        }
        prop_assert_eq!(next, nodes);
    }
}

#[cfg(test)]
mod invariant_tests {
    use super::*;

    #[test]
    fn test_empty_graph_invariants() {
        let edges = EdgeList::parse("0\t0\n").unwrap();
        let csr = CsrMatrix::from_edges(&edges).unwrap();

        let (row_offsets, col_indices, values) = csr.csr_components();
        assert_eq!(row_offsets, &[0]); // Single offset for empty graph
        assert!(col_indices.is_empty());
        assert!(values.is_empty());
        assert_eq!(JdsMatrix::from_csr(&csr, 4).unwrap().num_pieces(), 0);
    }

    #[test]
    fn test_single_edge_invariants() {
        let edges = EdgeList::parse("2\t1\n0\t1\n").unwrap();
        let csr = CsrMatrix::from_edges(&edges).unwrap();

        let (row_offsets, col_indices, values) = csr.csr_components();

        // row_offsets: [0, 0, 1] (row 0 has no predecessor, row 1 has node 0)
        assert_eq!(row_offsets, &[0, 0, 1]);
        assert_eq!(col_indices, &[0]);
        assert_eq!(values, &[1.0]);
        assert_eq!(csr.leaves(), &[1]);
    }
}
