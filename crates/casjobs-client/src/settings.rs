// crates/casjobs-client/src/settings.rs
// ============================================================================
// Module: CasJobs Client Settings
// Description: Transport and annotation settings for the CasJobs client.
// Purpose: Hold the immutable knobs every request is built from.
// Dependencies: url
// ============================================================================

//! ## Overview
//! [`ClientSettings`] carries the service base URI, request limits, and the
//! task-name annotation policy. Task names tell the server which client issued
//! a query; they differ when the caller runs inside the managed compute
//! environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::CasJobsError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default CasJobs REST endpoint.
pub const DEFAULT_REST_URI: &str = "https://skyserver.sdss.org/CasJobs/RestApi";
/// Default database context.
pub const DEFAULT_CONTEXT: &str = "MyDB";
/// Default task-name prefix reported to the server.
pub const DEFAULT_TASK_NAME_PREFIX: &str = "SciScript-Rust";
/// Keystone token file present inside the managed compute environment.
pub const COMPUTE_TOKEN_PATH: &str = "/home/idies/keystone.token";
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// Default response size cap in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 512 * 1024 * 1024;

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Where the client is running, for task-name annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    /// Detect by probing for the compute keystone token file.
    Auto(PathBuf),
    /// Always report the managed compute environment.
    Compute,
    /// Always report a standalone client.
    Standalone,
}

impl Default for ExecutionEnvironment {
    fn default() -> Self {
        Self::Auto(PathBuf::from(COMPUTE_TOKEN_PATH))
    }
}

impl ExecutionEnvironment {
    /// Returns true when requests should be annotated as compute-originated.
    #[must_use]
    pub fn is_compute(&self) -> bool {
        match self {
            Self::Auto(marker) => Path::new(marker).is_file(),
            Self::Compute => true,
            Self::Standalone => false,
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Settings for a [`crate::CasJobsClient`].
///
/// # Invariants
/// - `rest_uri` is an absolute http(s) URL that can carry path segments.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URI of the CasJobs REST API.
    pub rest_uri: Url,
    /// Timeout applied to each request.
    pub timeout: Duration,
    /// Maximum response body size in bytes.
    pub max_response_bytes: usize,
    /// User agent for outbound requests.
    pub user_agent: String,
    /// Prefix used in task-name annotations.
    pub task_name_prefix: String,
    /// Execution environment used for task-name annotations.
    pub environment: ExecutionEnvironment,
}

impl ClientSettings {
    /// Builds settings for a base URI with every other knob defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::InvalidUri`] when the URI is not an absolute
    /// http(s) URL.
    pub fn for_uri(rest_uri: &str) -> Result<Self, CasJobsError> {
        let rest_uri =
            Url::parse(rest_uri).map_err(|err| CasJobsError::InvalidUri(err.to_string()))?;
        match rest_uri.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CasJobsError::InvalidUri(format!("unsupported scheme: {scheme}")));
            }
        }
        if rest_uri.cannot_be_a_base() {
            return Err(CasJobsError::InvalidUri("uri cannot carry a path".to_string()));
        }
        Ok(Self {
            rest_uri,
            ..Self::default()
        })
    }

    /// Returns the task name reported for the given client method.
    #[must_use]
    pub fn task_name(&self, method: &str) -> String {
        if self.environment.is_compute() {
            format!("Compute.{}.CasJobs.{method}", self.task_name_prefix)
        } else {
            format!("{}.CasJobs.{method}", self.task_name_prefix)
        }
    }
}

impl Default for ClientSettings {
    #[allow(clippy::expect_used, reason = "The default URI is a checked constant.")]
    fn default() -> Self {
        Self {
            rest_uri: Url::parse(DEFAULT_REST_URI).expect("default rest uri parses"),
            timeout: DEFAULT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: format!("casjobs-client/{}", env!("CARGO_PKG_VERSION")),
            task_name_prefix: DEFAULT_TASK_NAME_PREFIX.to_string(),
            environment: ExecutionEnvironment::default(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
