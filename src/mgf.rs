//! MGF (Mascot Generic Format) parsing
//!
//! A spectral file is a sequence of records:
//!
//! ```text
//! BEGIN IONS
//! PEPMASS=981.54
//! CHARGE=0
//! SPECTRUMID=CCMSLIB00000001547
//! 289.286377 8068.0
//! 295.545288 22507.0
//! END IONS
//! ```
//!
//! Header keys are case-insensitive and stored lower-cased. Peak lines carry
//! `m/z intensity` separated by whitespace; extra columns are ignored.

use crate::error::{GraphError, Result};
use crate::graph::SpectrumId;
use std::collections::HashMap;

const BEGIN: &str = "BEGIN IONS";
const END: &str = "END IONS";

/// One `BEGIN IONS` … `END IONS` record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MgfRecord {
    /// Header parameters, keys lower-cased
    pub params: HashMap<String, String>,
    /// `(m/z, intensity)` pairs in file order
    pub peaks: Vec<(f64, f64)>,
}

impl MgfRecord {
    /// Header value for `key` (case-insensitive).
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// The `spectrumid` header.
    pub fn spectrum_id(&self) -> Option<&str> {
        self.param("spectrumid")
    }

    /// Precursor m/z: first token of `PEPMASS`, falling back to `PRECURSOR_MZ`.
    pub fn precursor_mz(&self) -> Option<f64> {
        self.param("pepmass")
            .or_else(|| self.param("precursor_mz"))
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    }
}

/// Parse every record in `text`.
pub fn parse(text: &str) -> Result<Vec<MgfRecord>> {
    let mut records = Vec::new();
    let mut current: Option<MgfRecord> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(['#', ';', '!', '/']) {
            continue;
        }

        if line.eq_ignore_ascii_case(BEGIN) {
            if current.is_some() {
                return Err(GraphError::MgfParse(format!(
                    "line {}: BEGIN IONS inside an open record",
                    lineno + 1
                )));
            }
            current = Some(MgfRecord::default());
            continue;
        }

        if line.eq_ignore_ascii_case(END) {
            match current.take() {
                Some(record) => records.push(record),
                None => {
                    return Err(GraphError::MgfParse(format!(
                        "line {}: END IONS without BEGIN IONS",
                        lineno + 1
                    )))
                }
            }
            continue;
        }

        // Global parameters outside a record are ignored.
        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some((key, value)) = line.split_once('=') {
            if !key.trim().is_empty() && !key.trim().starts_with(|c: char| c.is_ascii_digit()) {
                record
                    .params
                    .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
                continue;
            }
        }

        record.peaks.push(parse_peak(line).ok_or_else(|| {
            GraphError::MgfParse(format!("line {}: unreadable peak '{}'", lineno + 1, line))
        })?);
    }

    if current.is_some() {
        return Err(GraphError::MgfParse("unterminated record (missing END IONS)".into()));
    }

    Ok(records)
}

fn parse_peak(line: &str) -> Option<(f64, f64)> {
    let mut cols = line.split_whitespace();
    let mz = cols.next()?.parse().ok()?;
    let intensity = cols.next()?.parse().ok()?;
    Some((mz, intensity))
}

/// Spectral file content held in memory.
///
/// The raw text is kept so it can be handed to collaborators verbatim; the
/// first record is parsed eagerly so malformed files are rejected on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFile {
    raw: String,
    first: MgfRecord,
}

impl SpectrumFile {
    /// Parse `raw` and keep it; fails if there is no record.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let first = parse(&raw)?
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::MgfParse("no BEGIN IONS record found".into()))?;
        Ok(Self { raw, first })
    }

    /// The raw file text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The first record, which is the one submitted for matching.
    pub fn first_record(&self) -> &MgfRecord {
        &self.first
    }

    /// `spectrumid` of the first record.
    pub fn spectrum_id(&self) -> Result<SpectrumId> {
        self.first
            .spectrum_id()
            .map(str::to_string)
            .ok_or_else(|| GraphError::MissingField {
                field: "spectrumid".into(),
            })
    }
}
