//! Similarity Providers
//!
//! Abstraction over the external spectral-matching service. A provider takes
//! exactly one query spectrum and returns its top-N library neighbours with
//! similarity scores and the requested metadata.
//!
//! [`Spec2VecClient`] talks to a Seldon-style prediction endpoint;
//! [`MockSimilarityProvider`] serves canned matches for tests.
//!
//! # Wire format
//!
//! Request:
//!
//! ```json
//! {"data": {"ndarray": {
//!     "parameters": {"n_best_spectra": 5, "include_metadata": ["Compound_name"]},
//!     "data": [{"peaks_json": "[[289.28, 8068.0], ...]", "Precursor_MZ": "981.54"}]
//! }}}
//! ```
//!
//! Response, one object per submitted spectrum:
//!
//! ```json
//! {"jsonData": [{"CCMSLIB00000001548": {"score": 0.93, "Compound_name": "Hoiamide B"}}]}
//! ```

use crate::error::{GraphError, Result};
use crate::graph::{SimilarityEdge, SpectrumId};
use crate::mgf::SpectrumFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Ionisation mode of the query spectrum; selects the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IonMode {
    /// Positive ion mode
    #[default]
    Positive,
    /// Negative ion mode
    Negative,
}

impl IonMode {
    /// Lower-case name used in endpoint URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IonMode::Positive => "positive",
            IonMode::Negative => "negative",
        }
    }
}

impl std::str::FromStr for IonMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(IonMode::Positive),
            "negative" | "neg" | "-" => Ok(IonMode::Negative),
            other => Err(format!("unknown ion mode '{}' (expected positive or negative)", other)),
        }
    }
}

impl std::fmt::Display for IonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    /// Number of best matches to return
    pub top_n: usize,
    /// Metadata fields to include; the first is used as the display name
    pub include_metadata: Vec<String>,
    /// Library ion mode
    pub ion_mode: IonMode,
}

impl Default for MatchRequest {
    fn default() -> Self {
        Self {
            top_n: 5,
            include_metadata: vec!["Compound_name".to_string()],
            ion_mode: IonMode::Positive,
        }
    }
}

/// One library neighbour of a query spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumMatch {
    /// Library spectrum id
    pub id: SpectrumId,
    /// Similarity score
    pub score: f64,
    /// Requested metadata values
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SpectrumMatch {
    /// Match without metadata.
    pub fn new(id: impl Into<SpectrumId>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata value.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Value of `field`, matched case-insensitively.
    pub fn metadata_value(&self, field: &str) -> Option<&str> {
        self.metadata
            .get(field)
            .or_else(|| {
                self.metadata
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(field))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// Edge from the query to this match.
    pub fn to_edge(&self) -> SimilarityEdge {
        SimilarityEdge::new(self.id.clone(), self.score)
    }
}

/// External spectral-matching service.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Top matches for a single query spectrum, best first.
    async fn match_spectrum(&self, query: &SpectrumFile, request: &MatchRequest) -> Result<Vec<SpectrumMatch>>;
}

// ============================================================================
// Spec2Vec HTTP client
// ============================================================================

/// Spec2Vec client configuration.
#[derive(Debug, Clone)]
pub struct Spec2VecConfig {
    /// Prediction endpoint; `{ion_mode}` is substituted per request
    pub endpoint: String,
    /// Bearer token
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for Spec2VecConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://mlops.datarevenue.com/seldon/seldon/spec2vec-{ion_mode}/api/v0.1/predictions"
                .to_string(),
            token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl Spec2VecConfig {
    /// Configuration with the given token and default endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Read the token from `OMIGAMI_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("OMIGAMI_TOKEN")
            .map_err(|_| GraphError::InvalidConfig("OMIGAMI_TOKEN not set".into()))?;
        Ok(Self::new(token))
    }

    /// Override the endpoint template.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint for `mode`.
    pub fn endpoint_for(&self, mode: IonMode) -> String {
        self.endpoint.replace("{ion_mode}", mode.as_str())
    }
}

/// HTTP client for the Spec2Vec prediction service.
pub struct Spec2VecClient {
    config: Spec2VecConfig,
    client: reqwest::Client,
}

impl Spec2VecClient {
    /// Build a client.
    pub fn new(config: Spec2VecConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

/// Request body for a single query spectrum.
pub fn build_payload(query: &SpectrumFile, request: &MatchRequest) -> Result<Value> {
    let record = query.first_record();
    let precursor = record.precursor_mz().ok_or_else(|| GraphError::MissingField {
        field: "pepmass".into(),
    })?;
    let peaks = serde_json::to_string(&record.peaks)?;

    Ok(json!({
        "data": {
            "ndarray": {
                "parameters": {
                    "n_best_spectra": request.top_n,
                    "include_metadata": request.include_metadata,
                },
                "data": [{
                    "peaks_json": peaks,
                    "Precursor_MZ": precursor.to_string(),
                }],
            }
        }
    }))
}

/// Extract the matches of the first (only) submitted spectrum.
///
/// Matches come back sorted by descending score, ties broken by id, and
/// truncated to `top_n`.
pub fn parse_matches(body: &Value, top_n: usize) -> Result<Vec<SpectrumMatch>> {
    let malformed = |what: &str| GraphError::SimilarityProvider {
        message: format!("malformed response: {}", what),
        status: None,
    };

    let first = match body.get("jsonData") {
        Some(Value::Array(items)) => match items.first() {
            Some(item) => item,
            None => return Ok(Vec::new()),
        },
        Some(obj @ Value::Object(_)) => obj,
        _ => return Err(malformed("missing jsonData")),
    };
    let entries: &Map<String, Value> = first.as_object().ok_or_else(|| malformed("result is not an object"))?;

    let mut matches = Vec::with_capacity(entries.len());
    for (id, fields) in entries {
        let fields = fields
            .as_object()
            .ok_or_else(|| malformed(&format!("match '{}' is not an object", id)))?;
        let score = fields
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(&format!("match '{}' has no numeric score", id)))?;

        let metadata = fields
            .iter()
            .filter(|(k, v)| k.as_str() != "score" && !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect();

        matches.push(SpectrumMatch {
            id: id.clone(),
            score,
            metadata,
        });
    }

    matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    matches.truncate(top_n);
    Ok(matches)
}

#[async_trait]
impl SimilarityProvider for Spec2VecClient {
    fn name(&self) -> &str {
        "spec2vec"
    }

    async fn match_spectrum(&self, query: &SpectrumFile, request: &MatchRequest) -> Result<Vec<SpectrumMatch>> {
        let body = build_payload(query, request)?;
        let url = self.config.endpoint_for(request.ion_mode);
        debug!(url = %url, top_n = request.top_n, "Submitting spectrum for matching");

        let mut req = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GraphError::Timeout(self.config.timeout)
            } else {
                GraphError::SimilarityProvider {
                    message: e.to_string(),
                    status: None,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GraphError::SimilarityProvider {
                message: resp.text().await.unwrap_or_default(),
                status: Some(status.as_u16()),
            });
        }

        let result: Value = resp.json().await.map_err(|e| GraphError::SimilarityProvider {
            message: format!("invalid JSON: {}", e),
            status: Some(status.as_u16()),
        })?;

        parse_matches(&result, request.top_n)
    }
}

// ============================================================================
// Mock Provider
// ============================================================================

/// Canned matches keyed by query spectrum id.
///
/// Unknown queries yield an empty match list.
#[derive(Default)]
pub struct MockSimilarityProvider {
    matches: HashMap<SpectrumId, Vec<SpectrumMatch>>,
    failure: Option<u16>,
    call_count: AtomicU64,
}

impl MockSimilarityProvider {
    /// Provider with no canned matches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `matches` when `query` is submitted.
    pub fn with_matches(mut self, query: impl Into<SpectrumId>, matches: Vec<SpectrumMatch>) -> Self {
        self.matches.insert(query.into(), matches);
        self
    }

    /// Fail every call with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Default::default()
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SimilarityProvider for MockSimilarityProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn match_spectrum(&self, query: &SpectrumFile, request: &MatchRequest) -> Result<Vec<SpectrumMatch>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(status) = self.failure {
            return Err(GraphError::SimilarityProvider {
                message: "mock failure".into(),
                status: Some(status),
            });
        }
        let id = query.spectrum_id()?;
        let mut found = self.matches.get(&id).cloned().unwrap_or_default();
        found.truncate(request.top_n);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_host::synthetic_mgf;

    #[test]
    fn test_ion_mode_parse() {
        assert_eq!("positive".parse::<IonMode>(), Ok(IonMode::Positive));
        assert_eq!("NEG".parse::<IonMode>(), Ok(IonMode::Negative));
        assert!("neutral".parse::<IonMode>().is_err());
        assert_eq!(IonMode::Negative.to_string(), "negative");
    }

    #[test]
    fn test_endpoint_template() {
        let config = Spec2VecConfig::default();
        assert!(config.endpoint_for(IonMode::Negative).contains("spec2vec-negative"));
        let custom = Spec2VecConfig::new("t").with_endpoint("http://h/{ion_mode}/predict");
        assert_eq!(custom.endpoint_for(IonMode::Positive), "http://h/positive/predict");
    }

    #[test]
    fn test_config_from_env() {
        // Only test in the crate that touches OMIGAMI_TOKEN.
        let previous = std::env::var("OMIGAMI_TOKEN").ok();

        std::env::remove_var("OMIGAMI_TOKEN");
        assert!(matches!(Spec2VecConfig::from_env(), Err(GraphError::InvalidConfig(_))));

        std::env::set_var("OMIGAMI_TOKEN", "abc123");
        let config = Spec2VecConfig::from_env().unwrap();
        assert_eq!(config.token.as_deref(), Some("abc123"));
        assert_eq!(config.endpoint, Spec2VecConfig::default().endpoint);

        match previous {
            Some(v) => std::env::set_var("OMIGAMI_TOKEN", v),
            None => std::env::remove_var("OMIGAMI_TOKEN"),
        }
    }

    #[test]
    fn test_build_payload() {
        let query = SpectrumFile::parse(synthetic_mgf("q", 500.0)).unwrap();
        let payload = build_payload(&query, &MatchRequest::default()).unwrap();
        let inner = &payload["data"]["ndarray"];
        assert_eq!(inner["parameters"]["n_best_spectra"], 5);
        assert_eq!(inner["parameters"]["include_metadata"][0], "Compound_name");
        assert_eq!(inner["data"][0]["Precursor_MZ"], "500");
        let peaks: Vec<(f64, f64)> =
            serde_json::from_str(inner["data"][0]["peaks_json"].as_str().unwrap()).unwrap();
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn test_payload_requires_precursor() {
        let query = SpectrumFile::parse("BEGIN IONS\nSPECTRUMID=q\n1 1\nEND IONS\n").unwrap();
        assert!(matches!(
            build_payload(&query, &MatchRequest::default()),
            Err(GraphError::MissingField { .. })
        ));
    }

    #[test]
    fn test_parse_matches_sorted_and_truncated() {
        let body = json!({"jsonData": [{
            "b": {"score": 0.7, "Compound_name": "Beta"},
            "a": {"score": 0.9, "Compound_name": "Alpha"},
            "c": {"score": 0.7, "Compound_name": null},
            "d": {"score": 0.1}
        }]});
        let matches = parse_matches(&body, 3).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(matches[0].metadata_value("compound_name"), Some("Alpha"));
        assert_eq!(matches[2].metadata_value("Compound_name"), None);
    }

    #[test]
    fn test_parse_matches_errors() {
        assert!(parse_matches(&json!({"nope": 1}), 5).is_err());
        assert!(parse_matches(&json!({"jsonData": [{"a": {"score": "high"}}]}), 5).is_err());
        assert!(parse_matches(&json!({"jsonData": []}), 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockSimilarityProvider::new()
            .with_matches("q", vec![SpectrumMatch::new("x", 0.9), SpectrumMatch::new("y", 0.8)]);
        let query = SpectrumFile::parse(synthetic_mgf("q", 400.0)).unwrap();
        let request = MatchRequest {
            top_n: 1,
            ..Default::default()
        };
        let found = provider.match_spectrum(&query, &request).await.unwrap();
        assert_eq!(found, vec![SpectrumMatch::new("x", 0.9)]);
        assert_eq!(provider.call_count(), 1);

        let other = SpectrumFile::parse(synthetic_mgf("unknown", 400.0)).unwrap();
        assert!(provider.match_spectrum(&other, &request).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let provider = MockSimilarityProvider::failing(503);
        let query = SpectrumFile::parse(synthetic_mgf("q", 400.0)).unwrap();
        let err = provider.match_spectrum(&query, &MatchRequest::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::SimilarityProvider { status: Some(503), .. }));
    }
}
