// crates/casjobs-client/src/error.rs
// ============================================================================
// Module: CasJobs Errors
// Description: Error taxonomy for CasJobs client operations.
// Purpose: Surface every failure with enough detail to diagnose the cause.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`CasJobsError`] separates local precondition failures (raised before any
//! network call) from remote failures, which always carry the HTTP status and
//! the raw response body.
//! Invariants:
//! - No failure is swallowed or downgraded.
//! - Remote failures are never retried by the client.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::JobId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors emitted by the CasJobs client.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CasJobsError {
    /// No usable auth token is available.
    #[error("user token is not defined; first log into SciServer")]
    NotLoggedIn,
    /// The requested result format is not recognized.
    #[error("illegal format parameter specification: {0}")]
    IllegalFormat(String),
    /// A local argument was rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The service answered with a non-success status.
    #[error("{action}: CasJobs API returned status code {status}:\n{body}")]
    Remote {
        /// Human-readable description of the failed operation.
        action: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body text.
        body: String,
    },
    /// The HTTP request could not be completed.
    #[error("http transport failed: {0}")]
    Transport(String),
    /// The response body exceeded the configured size cap.
    #[error("http response exceeds size limit of {limit} bytes")]
    ResponseTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
    /// A response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Local file I/O failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The configured base URI cannot be used to build request URLs.
    #[error("invalid service uri: {0}")]
    InvalidUri(String),
    /// A bounded job wait ran out of time or polls.
    #[error("job {job_id} did not reach a terminal status after {polls} polls")]
    WaitTimedOut {
        /// Job being waited on.
        job_id: JobId,
        /// Number of status polls issued.
        polls: u32,
    },
    /// A job wait was cancelled by the caller.
    #[error("wait for job {job_id} was cancelled")]
    WaitCancelled {
        /// Job being waited on.
        job_id: JobId,
    },
}

impl CasJobsError {
    /// Returns the HTTP status for remote failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Remote {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for CasJobs client operations.
pub type Result<T> = std::result::Result<T, CasJobsError>;
