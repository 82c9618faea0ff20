//! Property-based tests for the graph assembler

use proptest::prelude::*;
use spectral_graph::{assemble, assemble_with, round_score, EdgeDedup, SimilarityEdge, SimilarityGraph};
use std::collections::HashSet;

/// Ids drawn from a small alphabet so that keys and neighbours collide often.
fn arb_id() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

fn arb_edges() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::vec((arb_id(), 0.0f64..1.0f64), 0..6)
}

fn arb_graph() -> impl Strategy<Value = SimilarityGraph> {
    prop::collection::vec((arb_id(), arb_edges()), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, edges)| (id, edges.into_iter().map(SimilarityEdge::from).collect::<Vec<_>>()))
            .collect()
    })
}

fn distinct_ids(graph: &SimilarityGraph) -> HashSet<String> {
    let mut ids = HashSet::new();
    for (id, edges) in graph.iter() {
        ids.insert(id.to_string());
        for edge in edges {
            ids.insert(edge.neighbor.clone());
        }
    }
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: one node per distinct id, no repeats
    #[test]
    fn prop_node_count_matches_distinct_ids(graph in arb_graph()) {
        let doc = assemble(&graph);
        let ids = distinct_ids(&graph);
        prop_assert_eq!(doc.nodes.len(), ids.len());

        let unique: HashSet<_> = doc.nodes.iter().map(|n| n.id.clone()).collect();
        prop_assert_eq!(unique, ids);
    }

    /// Property: edges are normalised, in range and never self-loops
    #[test]
    fn prop_edges_normalised(graph in arb_graph()) {
        let doc = assemble(&graph);
        for edge in &doc.edges {
            prop_assert!(edge.source < edge.target);
            prop_assert!(edge.target < doc.nodes.len());
        }
    }

    /// Property: no two edges share (source, target, similarity)
    #[test]
    fn prop_triple_dedup_unique(graph in arb_graph()) {
        let doc = assemble(&graph);
        let keys: HashSet<_> = doc
            .edges
            .iter()
            .map(|e| (e.source, e.target, e.similarity.clone()))
            .collect();
        prop_assert_eq!(keys.len(), doc.edges.len());
    }

    /// Property: pair dedup keeps at most one edge per node pair
    #[test]
    fn prop_pair_dedup_unique(graph in arb_graph()) {
        let triple = assemble_with(&graph, EdgeDedup::Triple);
        let pair = assemble_with(&graph, EdgeDedup::Pair);

        let pairs: HashSet<_> = pair.edges.iter().map(|e| (e.source, e.target)).collect();
        prop_assert_eq!(pairs.len(), pair.edges.len());
        prop_assert!(pair.edges.len() <= triple.edges.len());
        prop_assert_eq!(&pair.nodes, &triple.nodes);
    }

    /// Property: similarity labels carry at most three decimals
    #[test]
    fn prop_similarity_three_decimals(score in 0.0f64..1.0f64) {
        let graph: SimilarityGraph = vec![("a", vec![("b", score)])].into_iter().collect();
        let doc = assemble(&graph);
        prop_assert_eq!(doc.edges.len(), 1);

        let label = &doc.edges[0].similarity;
        let decimals = label.split('.').nth(1).map(str::len).unwrap_or(0);
        prop_assert!(decimals >= 1 && decimals <= 3, "label {}", label);
        prop_assert!((label.parse::<f64>().unwrap() - round_score(score)).abs() < 1e-12);
    }
}
