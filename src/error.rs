//! Error Types and Handling
//!
//! Error types for the spectral graph service with structured error codes for
//! programmatic handling and recovery hints for operators.
//!
//! # Error Categories
//!
//! | Range | Category | Examples |
//! |-------|----------|----------|
//! | 1xxx | I/O | Read, Write |
//! | 2xxx | Serialization | Serialize, MgfParse, MissingField |
//! | 3xxx | Collaborators | FileHost, SimilarityProvider |
//! | 4xxx | Query | NoMatches, NoQuerySpectrum, InvalidSpectrumId |
//! | 7xxx | Configuration | Invalid |
//! | 9xxx | Operational | Timeout |
//!
//! A failing file host, a failing similarity provider and a query with zero
//! matches are separate variants, each with its own HTTP status.
//!
//! # Example
//!
//! ```rust
//! use spectral_graph::error::{ErrorCode, GraphError, Recoverable, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     Err(GraphError::NoMatches(id.to_string()))
//! }
//!
//! let err = lookup("CCMSLIB00000001547").unwrap_err();
//! assert_eq!(err.error_code(), ErrorCode::NoMatches);
//! assert!(!err.is_retryable());
//! ```

use thiserror::Error;

/// Error code categories for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failed to read from disk or stdin
    IoRead = 1001,
    /// Failed to write to disk or stdout
    IoWrite = 1002,

    /// Failed to (de)serialize JSON
    SerializationFailed = 2001,
    /// Spectral file is not valid MGF
    InvalidFormat = 2002,
    /// A required MGF field is absent
    MissingField = 2003,

    /// The spectral file host failed or returned an error status
    FileHostFailed = 3001,
    /// The similarity provider failed or returned an error status
    ProviderFailed = 3002,

    /// The query spectrum produced no matches
    NoMatches = 4001,
    /// No query spectrum has been selected yet
    NoQuery = 4002,
    /// Spectrum identifier is not safe to use
    InvalidSpectrumId = 4003,

    /// Configuration value is invalid
    InvalidConfig = 7001,

    /// Operation timed out
    Timeout = 9001,
}

impl ErrorCode {
    /// Get the numeric error code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a brief description of the error category
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::IoRead | ErrorCode::IoWrite => "I/O",
            ErrorCode::SerializationFailed | ErrorCode::InvalidFormat | ErrorCode::MissingField => {
                "Serialization"
            }
            ErrorCode::FileHostFailed | ErrorCode::ProviderFailed => "Collaborator",
            ErrorCode::NoMatches | ErrorCode::NoQuery | ErrorCode::InvalidSpectrumId => "Query",
            ErrorCode::InvalidConfig => "Configuration",
            ErrorCode::Timeout => "Operational",
        }
    }
}

/// A recovery hint providing actionable guidance for resolving errors
#[derive(Debug, Clone)]
pub struct RecoveryHint {
    /// Short summary of the recovery action
    pub summary: String,
    /// Detailed steps or explanation
    pub details: Option<String>,
}

impl RecoveryHint {
    /// Create a new recovery hint with just a summary
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: None,
        }
    }

    /// Add detailed recovery steps
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for RecoveryHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        if let Some(details) = &self.details {
            write!(f, "\n  Details: {}", details)?;
        }
        Ok(())
    }
}

/// Trait for errors that can provide recovery hints
pub trait Recoverable {
    /// Get the error code for this error
    fn error_code(&self) -> ErrorCode;

    /// Get recovery hints for this error
    fn recovery_hints(&self) -> Vec<RecoveryHint>;

    /// Whether repeating the same request could plausibly succeed
    fn is_retryable(&self) -> bool;
}

/// Errors produced while fetching, matching and assembling spectra
#[must_use]
#[derive(Error, Debug)]
pub enum GraphError {
    /// Reading input or writing output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Spectral file is not valid MGF
    #[error("Invalid MGF data: {0}")]
    MgfParse(String),

    /// The first MGF record lacks a required header
    #[error("MGF record is missing required field '{field}'")]
    MissingField {
        /// Lower-cased header name
        field: String,
    },

    /// The file host could not deliver `{id}.mgf`
    #[error("File host error for spectrum '{id}': {message}")]
    FileHost {
        /// Spectrum that was requested
        id: String,
        /// Transport or status description
        message: String,
        /// HTTP status, if a response arrived
        status: Option<u16>,
    },

    /// The similarity provider failed or answered with garbage
    #[error("Similarity provider error: {message}")]
    SimilarityProvider {
        /// Transport, status or decoding description
        message: String,
        /// HTTP status, if a response arrived
        status: Option<u16>,
    },

    /// The root spectrum matched nothing
    #[error("No matches found for spectrum '{0}'")]
    NoMatches(String),

    /// `/data` was requested before a spectrum was selected
    #[error("No query spectrum selected")]
    NoQuerySpectrum,

    /// Spectrum id cannot be used in a file-host URL
    #[error("Invalid spectrum id: '{0}'")]
    InvalidSpectrumId(String),

    /// Configuration value is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collaborator call exceeded its timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Recoverable for GraphError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphError::Io(source) => match source.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::UnexpectedEof => ErrorCode::IoRead,
                _ => ErrorCode::IoWrite,
            },
            GraphError::Serialization(_) => ErrorCode::SerializationFailed,
            GraphError::MgfParse(_) => ErrorCode::InvalidFormat,
            GraphError::MissingField { .. } => ErrorCode::MissingField,
            GraphError::FileHost { .. } => ErrorCode::FileHostFailed,
            GraphError::SimilarityProvider { .. } => ErrorCode::ProviderFailed,
            GraphError::NoMatches(_) => ErrorCode::NoMatches,
            GraphError::NoQuerySpectrum => ErrorCode::NoQuery,
            GraphError::InvalidSpectrumId(_) => ErrorCode::InvalidSpectrumId,
            GraphError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            GraphError::Timeout(_) => ErrorCode::Timeout,
        }
    }

    fn recovery_hints(&self) -> Vec<RecoveryHint> {
        match self {
            GraphError::Io(_) => vec![
                RecoveryHint::new("Check that the input file exists and is readable"),
            ],

            GraphError::Serialization(_) => vec![
                RecoveryHint::new("Verify the input is valid JSON")
                    .with_details("A graph is an object mapping spectrum ids to [[id, score], ...] lists"),
            ],

            GraphError::MgfParse(reason) => vec![
                RecoveryHint::new(format!("Fix the spectral file: {}", reason)),
                RecoveryHint::new("Each record must be wrapped in BEGIN IONS / END IONS"),
            ],

            GraphError::MissingField { field } => vec![
                RecoveryHint::new(format!("Add a {}=... line to the first MGF record", field.to_uppercase())),
            ],

            GraphError::FileHost { id, status, .. } => {
                let mut hints = vec![RecoveryHint::new(format!(
                    "Check that '{}.mgf' exists on the file host",
                    id
                ))];
                if status.is_none() {
                    hints.push(RecoveryHint::new("Check network connectivity to the file host"));
                }
                hints
            }

            GraphError::SimilarityProvider { status, .. } => match status {
                Some(401) | Some(403) => vec![
                    RecoveryHint::new("Check the similarity provider token")
                        .with_details("Set OMIGAMI_TOKEN or pass --token"),
                ],
                _ => vec![
                    RecoveryHint::new("Check that the similarity provider endpoint is reachable"),
                    RecoveryHint::new("Verify the ion mode matches the query spectrum"),
                ],
            },

            GraphError::NoMatches(id) => vec![
                RecoveryHint::new(format!("Spectrum '{}' has no library neighbours", id)),
                RecoveryHint::new("Try the other ion mode or a larger top-N"),
            ],

            GraphError::NoQuerySpectrum => vec![
                RecoveryHint::new("Select a spectrum first: GET /?spectrum_id=<id>"),
            ],

            GraphError::InvalidSpectrumId(_) => vec![
                RecoveryHint::new("Spectrum ids may only contain letters, digits, '_', '-' and '.'"),
            ],

            GraphError::InvalidConfig(reason) => vec![
                RecoveryHint::new(format!("Fix configuration: {}", reason)),
            ],

            GraphError::Timeout(duration) => vec![
                RecoveryHint::new(format!("Request timed out after {:?}", duration)),
                RecoveryHint::new("Increase --timeout-secs or retry later"),
            ],
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            GraphError::Timeout(_) => true,
            GraphError::FileHost { status, .. } | GraphError::SimilarityProvider { status, .. } => {
                status.map_or(true, |s| s >= 500)
            }
            _ => false,
        }
    }
}

impl GraphError {
    /// Get a formatted error message with recovery hints
    pub fn format_with_hints(&self) -> String {
        let hints = self.recovery_hints();
        let mut output = format!("Error [{}]: {}", self.error_code().code(), self);

        if !hints.is_empty() {
            output.push_str("\n\nRecovery suggestions:");
            for (i, hint) in hints.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, hint));
            }
        }

        if self.is_retryable() {
            output.push_str("\n\nThis error is retryable.");
        }

        output
    }

    /// Returns the single most useful suggestion for fixing the error.
    pub fn help(&self) -> String {
        match self {
            GraphError::NoQuerySpectrum => String::from(
                "No spectrum has been selected. Open /?spectrum_id=<id> before requesting /data.",
            ),
            GraphError::NoMatches(id) => format!(
                "The similarity provider returned zero matches for '{}'. \
                 The service is reachable; the library simply has no neighbours for this spectrum.",
                id
            ),
            _ => self
                .recovery_hints()
                .first()
                .map(|h| h.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Result type alias for spectral graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
