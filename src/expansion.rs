//! One-hop Similarity Expansion
//!
//! Drives the collaborators to build a [`SimilarityGraph`]: match the root
//! spectrum, then fetch and match each of the root's top hits. There is no
//! further recursion. Calls are made strictly one after another, and spectra
//! are passed by value from the file host to the provider.
//!
//! ```rust
//! use spectral_graph::expansion::{ExpansionConfig, ExpansionDriver};
//! use spectral_graph::file_host::{synthetic_mgf, MockFileHost};
//! use spectral_graph::mgf::SpectrumFile;
//! use spectral_graph::similarity::{MockSimilarityProvider, SpectrumMatch};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> spectral_graph::Result<()> {
//! let host = MockFileHost::new().with_file("hit", synthetic_mgf("hit", 310.0));
//! let provider = MockSimilarityProvider::new()
//!     .with_matches("root", vec![SpectrumMatch::new("hit", 0.91)])
//!     .with_matches("hit", vec![SpectrumMatch::new("root", 0.91)]);
//!
//! let driver = ExpansionDriver::new(Arc::new(host), Arc::new(provider), ExpansionConfig::default());
//! let root = SpectrumFile::parse(synthetic_mgf("root", 300.0))?;
//! let doc = driver.build_document(&root).await?;
//! assert_eq!(doc.nodes.len(), 2);
//! assert_eq!(doc.edges.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{GraphError, Result};
use crate::file_host::{validate_spectrum_id, FileHost};
use crate::graph::{assemble_with, EdgeDedup, GraphDocument, SimilarityGraph, SpectrumId};
use crate::mgf::SpectrumFile;
use crate::similarity::{IonMode, MatchRequest, SimilarityProvider, SpectrumMatch};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Expansion parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionConfig {
    /// Parameters passed on every matching call
    pub request: MatchRequest,
    /// Edge dedup policy used when assembling
    pub dedup: EdgeDedup,
}

impl ExpansionConfig {
    /// Set the number of matches per call.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.request.top_n = top_n;
        self
    }

    /// Set the ion mode.
    pub fn with_ion_mode(mut self, mode: IonMode) -> Self {
        self.request.ion_mode = mode;
        self
    }

    /// Set the metadata fields; the first becomes the display name.
    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.request.include_metadata = fields;
        self
    }

    /// Set the edge dedup policy.
    pub fn with_dedup(mut self, dedup: EdgeDedup) -> Self {
        self.dedup = dedup;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.request.top_n == 0 {
            return Err(GraphError::InvalidConfig("top_n must be at least 1".into()));
        }
        Ok(())
    }

    fn name_field(&self) -> Option<&str> {
        self.request.include_metadata.first().map(String::as_str)
    }
}

/// Raw result of an expansion, before assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// Root spectrum id
    pub root: SpectrumId,
    /// Accumulated relations, root first
    pub graph: SimilarityGraph,
    /// Display names merged across all calls
    pub id_names: BTreeMap<SpectrumId, String>,
}

/// Runs the fetch-and-match loop against the collaborators.
pub struct ExpansionDriver {
    file_host: Arc<dyn FileHost>,
    provider: Arc<dyn SimilarityProvider>,
    config: ExpansionConfig,
}

impl ExpansionDriver {
    /// Create a driver over the given collaborators.
    pub fn new(file_host: Arc<dyn FileHost>, provider: Arc<dyn SimilarityProvider>, config: ExpansionConfig) -> Self {
        Self {
            file_host,
            provider,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Download the spectral file for `id` to use as a new root.
    pub async fn fetch_query(&self, id: &str) -> Result<SpectrumFile> {
        let file = self.file_host.fetch(id).await?;
        info!(spectrum_id = %id, host = self.file_host.name(), "Fetched query spectrum");
        Ok(file)
    }

    /// Match the root, then each of its hits once.
    pub async fn expand(&self, root: &SpectrumFile) -> Result<Expansion> {
        self.config.validate()?;
        let started = Instant::now();
        let root_id = root.spectrum_id()?;

        let mut expansion = Expansion {
            root: root_id.clone(),
            ..Default::default()
        };

        let matches = self.provider.match_spectrum(root, &self.config.request).await?;
        if matches.is_empty() {
            return Err(GraphError::NoMatches(root_id));
        }
        debug!(spectrum_id = %root_id, matches = matches.len(), "Matched root spectrum");
        self.record(&mut expansion, &root_id, &matches);

        for hit in &matches {
            // Provider ids end up in file-host URLs; unusable ones stay leaves.
            if validate_spectrum_id(&hit.id).is_err() {
                warn!(spectrum_id = %hit.id, "Skipping neighbour with unusable id from similarity provider");
                continue;
            }
            let neighbour = self.file_host.fetch(&hit.id).await?;
            let hit_matches = self.provider.match_spectrum(&neighbour, &self.config.request).await?;
            if hit_matches.is_empty() {
                warn!(spectrum_id = %hit.id, "Neighbour spectrum has no matches");
            }
            self.record(&mut expansion, &hit.id, &hit_matches);
        }

        info!(
            root = %root_id,
            keys = expansion.graph.len(),
            provider = self.provider.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Expansion complete"
        );
        Ok(expansion)
    }

    /// Expand from `root` and assemble the front-end document.
    pub async fn build_document(&self, root: &SpectrumFile) -> Result<GraphDocument> {
        let expansion = self.expand(root).await?;
        let doc = assemble_with(&expansion.graph, self.config.dedup).with_id_names(expansion.id_names);
        debug!(nodes = doc.nodes.len(), edges = doc.edges.len(), "Assembled graph document");
        Ok(doc)
    }

    fn record(&self, expansion: &mut Expansion, id: &str, matches: &[SpectrumMatch]) {
        if let Some(field) = self.config.name_field() {
            for m in matches {
                if let Some(name) = m.metadata_value(field) {
                    expansion.id_names.insert(m.id.clone(), name.to_string());
                }
            }
        }
        expansion
            .graph
            .insert(id, matches.iter().map(SpectrumMatch::to_edge).collect());
    }
}
