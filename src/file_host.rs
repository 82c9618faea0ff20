//! Spectral File Host
//!
//! Fetches `{id}.mgf` files from a static file host. The content is returned
//! by value as a parsed [`SpectrumFile`]; nothing is written to disk.
//!
//! # Example
//!
//! ```rust,no_run
//! use spectral_graph::file_host::{FileHost, FileHostConfig, HttpFileHost};
//!
//! #[tokio::main]
//! async fn main() -> spectral_graph::Result<()> {
//!     let host = HttpFileHost::new(FileHostConfig::default())?;
//!     let file = host.fetch("CCMSLIB00000001547").await?;
//!     println!("{}", file.spectrum_id()?);
//!     Ok(())
//! }
//! ```

use crate::error::{GraphError, Result};
use crate::mgf::SpectrumFile;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// File host configuration.
#[derive(Debug, Clone)]
pub struct FileHostConfig {
    /// Base URL; files are fetched from `{base_url}/{id}.mgf`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for FileHostConfig {
    fn default() -> Self {
        Self {
            base_url: "https://files.omigami.com/gnps".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FileHostConfig {
    /// Configuration pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of the spectral file for `id`.
    pub fn file_url(&self, id: &str) -> String {
        format!("{}/{}.mgf", self.base_url.trim_end_matches('/'), id)
    }
}

/// Reject ids that could escape the `{base}/{id}.mgf` pattern.
pub fn validate_spectrum_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 256
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(GraphError::InvalidSpectrumId(id.to_string()))
    }
}

/// Source of spectral files.
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Download and parse the spectral file for `id`.
    async fn fetch(&self, id: &str) -> Result<SpectrumFile>;
}

/// File host reached over HTTP.
pub struct HttpFileHost {
    config: FileHostConfig,
    client: reqwest::Client,
}

impl HttpFileHost {
    /// Build a client for the configured host.
    pub fn new(config: FileHostConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// The active configuration.
    pub fn config(&self) -> &FileHostConfig {
        &self.config
    }
}

#[async_trait]
impl FileHost for HttpFileHost {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, id: &str) -> Result<SpectrumFile> {
        validate_spectrum_id(id)?;
        let url = self.config.file_url(id);
        debug!(url = %url, "Fetching spectral file");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GraphError::Timeout(self.config.timeout)
            } else {
                GraphError::FileHost {
                    id: id.to_string(),
                    message: e.to_string(),
                    status: None,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GraphError::FileHost {
                id: id.to_string(),
                message: format!("GET {} returned {}", url, status),
                status: Some(status.as_u16()),
            });
        }

        let text = resp.text().await.map_err(|e| GraphError::FileHost {
            id: id.to_string(),
            message: e.to_string(),
            status: Some(status.as_u16()),
        })?;

        SpectrumFile::parse(text)
    }
}

/// In-memory file host for tests and offline runs.
#[derive(Default)]
pub struct MockFileHost {
    files: HashMap<String, String>,
    fetch_count: AtomicU64,
}

impl MockFileHost {
    /// Empty host; every fetch fails with a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `id`.
    pub fn with_file(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(id.into(), content.into());
        self
    }

    /// Number of fetches served or refused.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FileHost for MockFileHost {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, id: &str) -> Result<SpectrumFile> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        validate_spectrum_id(id)?;
        match self.files.get(id) {
            Some(content) => SpectrumFile::parse(content.clone()),
            None => Err(GraphError::FileHost {
                id: id.to_string(),
                message: format!("{}.mgf not found", id),
                status: Some(404),
            }),
        }
    }
}

/// Minimal single-record MGF text for `id`.
pub fn synthetic_mgf(id: &str, precursor_mz: f64) -> String {
    format!(
        "BEGIN IONS\nPEPMASS={}\nCHARGE=1\nSPECTRUMID={}\n100.0 10.0\n{:.4} 100.0\nEND IONS\n",
        precursor_mz,
        id,
        precursor_mz - 18.0106
    )
}
