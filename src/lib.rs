//! # Spectral Graph - Mass Spectrum Similarity Networks
//!
//! Builds a one-hop similarity network around a GNPS library spectrum and
//! serves it to a browser viewer.
//!
//! The pipeline has three stages:
//!
//! 1. **Fetch** the query spectrum's MGF file from a static file host.
//! 2. **Expand**: ask a Spec2Vec similarity provider for the query's top
//!    matches, then fetch and match each of those hits once.
//! 3. **Assemble** the accumulated relations into an indexed node/edge
//!    document with deduplicated edges and 3-decimal similarity labels.
//!
//! ## Quick Start
//!
//! ```rust
//! use spectral_graph::{assemble, SimilarityGraph};
//!
//! fn main() -> spectral_graph::Result<()> {
//!     let graph: SimilarityGraph = serde_json::from_str(
//!         r#"{"a": [["b", 0.91234], ["c", 0.5]], "b": [["a", 0.91234]]}"#,
//!     )?;
//!
//!     let doc = assemble(&graph);
//!     assert_eq!(doc.nodes.len(), 3);
//!     assert_eq!(doc.edges.len(), 2);
//!     assert_eq!(doc.edges[0].similarity, "0.912");
//!     Ok(())
//! }
//! ```
//!
//! ## Serving
//!
//! ```rust,no_run
//! # #[cfg(feature = "server")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use spectral_graph::server::{serve, ServerConfig};
//!
//! serve(ServerConfig::new("127.0.0.1:1338")?).await
//! # }
//! ```

#![warn(missing_docs)]

// ── Core ──────────────────────────────────────────────────────────────────────
pub mod error;
pub mod graph;
pub mod mgf;

// ── Collaborators ─────────────────────────────────────────────────────────────
pub mod file_host;
pub mod similarity;

// ── Expansion & presentation ─────────────────────────────────────────────────
pub mod expansion;
pub mod page;

#[cfg(feature = "server")]
pub mod server;

pub use error::{ErrorCode, GraphError, Recoverable, RecoveryHint, Result};
pub use expansion::{Expansion, ExpansionConfig, ExpansionDriver};
pub use file_host::{FileHost, FileHostConfig, HttpFileHost, MockFileHost};
pub use graph::{
    assemble, assemble_with, format_score, round_score, EdgeDedup, GraphDocument, GraphLink, GraphNode, NodeIndex,
    SimilarityEdge, SimilarityGraph, SpectrumId,
};
pub use mgf::{MgfRecord, SpectrumFile};
pub use similarity::{
    IonMode, MatchRequest, MockSimilarityProvider, SimilarityProvider, Spec2VecClient, Spec2VecConfig, SpectrumMatch,
};

#[cfg(feature = "server")]
pub use server::{serve, ServerConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use spectral_graph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{GraphError, Result};
    pub use crate::expansion::{ExpansionConfig, ExpansionDriver};
    pub use crate::file_host::FileHost;
    pub use crate::graph::{assemble, GraphDocument, SimilarityGraph};
    pub use crate::similarity::SimilarityProvider;
}
