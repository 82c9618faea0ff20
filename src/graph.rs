//! Similarity Graph Assembly
//!
//! Flattens an accumulated similarity mapping (spectrum → neighbours with
//! scores) into the node/edge document consumed by the force-directed
//! front-end.
//!
//! # Indexing
//!
//! Node indices are dense and assigned on first sighting while scanning the
//! graph: each key in insertion order, and right after it that key's
//! neighbours in list order. Re-inserting a key replaces its neighbour list
//! but keeps its position.
//!
//! # Edge deduplication
//!
//! Every relation is stored as `(min_index, max_index, rounded_score)`.
//! Self-loops are dropped. With [`EdgeDedup::Triple`] (the default) only exact
//! triples collapse, so the same pair recorded with two different rounded
//! scores yields two parallel edges. [`EdgeDedup::Pair`] keys by the index
//! pair alone and keeps the last score seen.
//!
//! # Example
//!
//! ```rust
//! use spectral_graph::graph::{assemble, SimilarityGraph};
//!
//! let mut graph = SimilarityGraph::new();
//! graph.insert("a", vec![("b", 0.5).into(), ("b", 0.5).into()]);
//!
//! let doc = assemble(&graph);
//! assert_eq!(doc.nodes.len(), 2);
//! assert_eq!(doc.edges.len(), 1);
//! assert_eq!(doc.edges[0].similarity, "0.5");
//! ```

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Opaque identifier of a mass spectrum.
pub type SpectrumId = String;

/// Dense index of a node in an assembled document.
pub type NodeIndex = usize;

/// A directed similarity from some source spectrum to `neighbor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    /// Neighbouring spectrum
    pub neighbor: SpectrumId,
    /// Similarity score, nominally in `[0, 1]`
    pub score: f64,
}

impl SimilarityEdge {
    /// Create an edge to `neighbor` with the given score.
    pub fn new(neighbor: impl Into<SpectrumId>, score: f64) -> Self {
        Self {
            neighbor: neighbor.into(),
            score,
        }
    }
}

impl<S: Into<SpectrumId>> From<(S, f64)> for SimilarityEdge {
    fn from((neighbor, score): (S, f64)) -> Self {
        Self::new(neighbor, score)
    }
}

/// Insertion-ordered mapping from spectrum to its similarity edges.
///
/// Serializes as a JSON object `{"id": [["neighbor", score], ...]}`; key order
/// is preserved on both serialization and deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityGraph {
    entries: Vec<(SpectrumId, Vec<SimilarityEdge>)>,
    positions: HashMap<SpectrumId, usize>,
}

impl SimilarityGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `edges` as the neighbour list of `id`.
    ///
    /// An existing key keeps its position and has its list replaced.
    pub fn insert(&mut self, id: impl Into<SpectrumId>, edges: Vec<SimilarityEdge>) {
        let id = id.into();
        match self.positions.get(&id) {
            Some(&pos) => self.entries[pos].1 = edges,
            None => {
                self.positions.insert(id.clone(), self.entries.len());
                self.entries.push((id, edges));
            }
        }
    }

    /// Neighbour list recorded for `id`, if it is a key.
    pub fn get(&self, id: &str) -> Option<&[SimilarityEdge]> {
        self.positions
            .get(id)
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    /// Whether `id` is a key of the graph.
    pub fn contains_key(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate keys and their edges in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SimilarityEdge])> {
        self.entries
            .iter()
            .map(|(id, edges)| (id.as_str(), edges.as_slice()))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }
}

impl<K, E> FromIterator<(K, Vec<E>)> for SimilarityGraph
where
    K: Into<SpectrumId>,
    E: Into<SimilarityEdge>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<E>)>>(iter: I) -> Self {
        let mut graph = SimilarityGraph::new();
        for (id, edges) in iter {
            graph.insert(id, edges.into_iter().map(Into::into).collect());
        }
        graph
    }
}

impl Serialize for SimilarityGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, edges) in &self.entries {
            let pairs: Vec<(&str, f64)> = edges
                .iter()
                .map(|e| (e.neighbor.as_str(), e.score))
                .collect();
            map.serialize_entry(id, &pairs)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SimilarityGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GraphVisitor;

        impl<'de> serde::de::Visitor<'de> for GraphVisitor {
            type Value = SimilarityGraph;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of spectrum id to [[neighbor, score], ...]")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut graph = SimilarityGraph::new();
                while let Some((id, pairs)) = access.next_entry::<String, Vec<(String, f64)>>()? {
                    graph.insert(id, pairs.into_iter().map(SimilarityEdge::from).collect());
                }
                Ok(graph)
            }
        }

        deserializer.deserialize_map(GraphVisitor)
    }
}

/// How parallel edges between the same pair of nodes are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDedup {
    /// Key by `(source, target, rounded score)`; only exact duplicates collapse.
    #[default]
    Triple,
    /// Key by `(source, target)`; the last score seen for the pair wins.
    Pair,
}

impl std::str::FromStr for EdgeDedup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "triple" => Ok(EdgeDedup::Triple),
            "pair" => Ok(EdgeDedup::Pair),
            other => Err(format!("unknown edge dedup policy '{}' (expected triple or pair)", other)),
        }
    }
}

/// A node of the output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Spectrum identifier
    pub id: SpectrumId,
}

/// An undirected edge of the output document, `source < target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    /// Smaller node index
    pub source: NodeIndex,
    /// Larger node index
    pub target: NodeIndex,
    /// Score rounded to three decimals, as a decimal string
    pub similarity: String,
}

/// The document served to the front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    /// Nodes in index order
    pub nodes: Vec<GraphNode>,
    /// Deduplicated edges
    pub edges: Vec<GraphLink>,
    /// Display names keyed by spectrum id
    #[serde(default)]
    pub id_names: BTreeMap<SpectrumId, String>,
}

impl GraphDocument {
    /// Attach display names to the document.
    pub fn with_id_names(mut self, id_names: BTreeMap<SpectrumId, String>) -> Self {
        self.id_names = id_names;
        self
    }

    /// Index of the node with the given id.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

/// Round to three decimal places.
///
/// Rounds on the exact decimal expansion of the input (as the `{:.3}`
/// formatter does) and reparses, so the result is the closest `f64` to the
/// three-digit decimal.
pub fn round_score(score: f64) -> f64 {
    if !score.is_finite() {
        return score;
    }
    format!("{:.3}", score).parse().unwrap_or(score)
}

/// Shortest decimal representation of `value`, always with a decimal point.
pub fn format_score(value: f64) -> String {
    let mut s = value.to_string();
    if value.is_finite() && !s.contains('.') && !s.contains('e') {
        s.push_str(".0");
    }
    s
}

fn assign_index<'a>(id: &'a str, index: &mut HashMap<&'a str, NodeIndex>, nodes: &mut Vec<GraphNode>) {
    if !index.contains_key(id) {
        index.insert(id, nodes.len());
        nodes.push(GraphNode { id: id.to_string() });
    }
}

/// Assemble `graph` using the default [`EdgeDedup::Triple`] policy.
pub fn assemble(graph: &SimilarityGraph) -> GraphDocument {
    assemble_with(graph, EdgeDedup::Triple)
}

/// Assemble `graph` into nodes and deduplicated edges.
pub fn assemble_with(graph: &SimilarityGraph, dedup: EdgeDedup) -> GraphDocument {
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    let mut nodes = Vec::new();

    // Two-phase per key: the key itself, then its neighbours.
    for (id, edges) in graph.iter() {
        assign_index(id, &mut index, &mut nodes);
        for edge in edges {
            assign_index(edge.neighbor.as_str(), &mut index, &mut nodes);
        }
    }

    let mut order: Vec<(NodeIndex, NodeIndex, OrderedFloat<f64>)> = Vec::new();
    let mut seen: HashSet<(NodeIndex, NodeIndex, OrderedFloat<f64>)> = HashSet::new();
    let mut by_pair: HashMap<(NodeIndex, NodeIndex), usize> = HashMap::new();

    for (id, edges) in graph.iter() {
        let from = index[id];
        for edge in edges {
            let to = index[edge.neighbor.as_str()];
            if from == to {
                continue;
            }
            let (source, target) = if from < to { (from, to) } else { (to, from) };
            let key = (source, target, OrderedFloat(round_score(edge.score)));

            match dedup {
                EdgeDedup::Triple => {
                    if seen.insert(key) {
                        order.push(key);
                    }
                }
                EdgeDedup::Pair => match by_pair.get(&(source, target)) {
                    Some(&slot) => order[slot] = key,
                    None => {
                        by_pair.insert((source, target), order.len());
                        order.push(key);
                    }
                },
            }
        }
    }

    let edges = order
        .into_iter()
        .map(|(source, target, score)| GraphLink {
            source,
            target,
            similarity: format_score(score.into_inner()),
        })
        .collect();

    GraphDocument {
        nodes,
        edges,
        id_names: BTreeMap::new(),
    }
}
