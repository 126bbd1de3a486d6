// crates/casjobs-client/src/format.rs
// ============================================================================
// Module: Result Formats
// Description: Closed set of synchronous query result representations.
// Purpose: Negotiate Accept headers and decode response bodies per format.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`ResultFormat`] names the representation a synchronous query returns. Each
//! variant owns its Accept header and its decoder, so an unsupported format is
//! rejected when the name is parsed, never after a request was sent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use serde_json::Value;

use crate::client::parse_json;
use crate::error::CasJobsError;
use crate::frame::DataFrame;

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Accept header for structured JSON results.
pub const ACCEPT_JSON_ARRAY: &str = "application/json+array";
/// Accept header for delimited text results.
pub const ACCEPT_TEXT: &str = "text/plain";
/// Accept header for FITS results.
pub const ACCEPT_FITS: &str = "application/fits";

/// Synchronous query result format.
///
/// # Invariants
/// - Variants are stable; textual names match the service client conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    /// Tabular frame built from the JSON result set.
    Pandas,
    /// Raw CSV text.
    Csv,
    /// Re-readable view over the CSV text.
    Readable,
    /// Opaque FITS binary table.
    Fits,
    /// Structured JSON record as returned by the service.
    Json,
}

impl ResultFormat {
    /// All formats, in declaration order.
    pub const ALL: [Self; 5] = [Self::Pandas, Self::Csv, Self::Readable, Self::Fits, Self::Json];

    /// Returns the stable textual name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pandas => "pandas",
            Self::Csv => "csv",
            Self::Readable => "readable",
            Self::Fits => "fits",
            Self::Json => "json",
        }
    }

    /// Returns the Accept header that negotiates this representation.
    #[must_use]
    pub const fn accept_header(self) -> &'static str {
        match self {
            Self::Pandas | Self::Json => ACCEPT_JSON_ARRAY,
            Self::Csv | Self::Readable => ACCEPT_TEXT,
            Self::Fits => ACCEPT_FITS,
        }
    }

    /// Decodes a successful response body into this format's output.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when the body does not match the
    /// negotiated representation.
    pub fn decode(self, body: Vec<u8>) -> Result<QueryOutput, CasJobsError> {
        match self {
            Self::Readable => Ok(QueryOutput::Readable(TextResult::new(utf8(body)?))),
            Self::Csv => Ok(QueryOutput::Csv(utf8(body)?)),
            Self::Pandas => {
                let value = parse_json(&body)?;
                Ok(QueryOutput::Frame(DataFrame::from_result_json(&value)?))
            }
            Self::Json => Ok(QueryOutput::Json(parse_json(&body)?)),
            Self::Fits => Ok(QueryOutput::Fits(FitsBlob::new(body))),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultFormat {
    type Err = CasJobsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| CasJobsError::IllegalFormat(value.to_string()))
    }
}

/// Converts a body into UTF-8 text.
fn utf8(body: Vec<u8>) -> Result<String, CasJobsError> {
    String::from_utf8(body)
        .map_err(|_| CasJobsError::Decode("response body is not utf-8".to_string()))
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Decoded synchronous query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Re-readable CSV text.
    Readable(TextResult),
    /// Raw CSV text.
    Csv(String),
    /// Tabular frame.
    Frame(DataFrame),
    /// Structured JSON record.
    Json(Value),
    /// FITS binary table bytes.
    Fits(FitsBlob),
}

impl QueryOutput {
    /// Returns the format that produced this output.
    #[must_use]
    pub const fn format(&self) -> ResultFormat {
        match self {
            Self::Readable(_) => ResultFormat::Readable,
            Self::Csv(_) => ResultFormat::Csv,
            Self::Frame(_) => ResultFormat::Pandas,
            Self::Json(_) => ResultFormat::Json,
            Self::Fits(_) => ResultFormat::Fits,
        }
    }

    /// Extracts re-readable text, failing for other variants.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when the output has another shape.
    pub fn into_readable(self) -> Result<TextResult, CasJobsError> {
        match self {
            Self::Readable(text) => Ok(text),
            other => Err(unexpected(ResultFormat::Readable, other.format())),
        }
    }

    /// Extracts FITS bytes, failing for other variants.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when the output has another shape.
    pub fn into_fits(self) -> Result<FitsBlob, CasJobsError> {
        match self {
            Self::Fits(blob) => Ok(blob),
            other => Err(unexpected(ResultFormat::Fits, other.format())),
        }
    }
}

/// Builds the error for a mismatched output variant.
fn unexpected(wanted: ResultFormat, got: ResultFormat) -> CasJobsError {
    CasJobsError::Decode(format!("expected {wanted} output, got {got}"))
}

/// Text result that can be read any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResult {
    /// Full response text.
    text: String,
}

impl TextResult {
    /// Wraps response text.
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self {
            text,
        }
    }

    /// Returns a fresh reader positioned at the start of the text.
    #[must_use]
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.text.as_bytes())
    }

    /// Returns the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the result and returns the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Opaque FITS payload handed to an external reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitsBlob {
    /// Raw FITS bytes.
    bytes: Vec<u8>,
}

impl FitsBlob {
    /// Wraps raw FITS bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
        }
    }

    /// Returns a fresh reader positioned at the start of the payload.
    #[must_use]
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.bytes.as_slice())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the blob and returns the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
