#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spectral_graph::{assemble_with, EdgeDedup, SimilarityEdge, SimilarityGraph};
use std::collections::HashSet;

#[derive(Arbitrary, Debug)]
struct GraphInput {
    entries: Vec<(u8, Vec<(u8, f64)>)>,
    pair_dedup: bool,
}

fuzz_target!(|input: GraphInput| {
    // Limit size to keep iterations fast
    if input.entries.len() > 64 {
        return;
    }

    let graph: SimilarityGraph = input
        .entries
        .iter()
        .map(|(id, edges)| {
            let edges: Vec<SimilarityEdge> = edges
                .iter()
                .take(64)
                .map(|(n, score)| SimilarityEdge::new(format!("s{}", n % 16), *score))
                .collect();
            (format!("s{}", id % 16), edges)
        })
        .collect();

    let dedup = if input.pair_dedup { EdgeDedup::Pair } else { EdgeDedup::Triple };
    let doc = assemble_with(&graph, dedup);

    let unique: HashSet<_> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(unique.len(), doc.nodes.len());
    for edge in &doc.edges {
        assert!(edge.source < edge.target);
        assert!(edge.target < doc.nodes.len());
    }

    if let Ok(json) = serde_json::to_string(&doc) {
        assert!(json.contains("\"idNames\""));
    }
});
