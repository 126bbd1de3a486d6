// crates/casjobs-config/src/config.rs
// ============================================================================
// Module: CasJobs Configuration
// Description: Configuration loading and validation for the CasJobs client.
// Purpose: Provide strict config parsing with hard limits and SDK resolution.
// Dependencies: casjobs-client, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits
//! and validated before use. A validated [`ClientConfig`] resolves into the
//! SDK's settings, credential providers, identity resolver, telemetry
//! observer, and wait options.
//! Security posture: config inputs are untrusted; tokens are never stored in
//! the file itself, only where to find them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use casjobs_client::CasJobsClient;
use casjobs_client::CasJobsClientBuilder;
use casjobs_client::ChainedToken;
use casjobs_client::ClientObserver;
use casjobs_client::ClientSettings;
use casjobs_client::EnvToken;
use casjobs_client::ExecutionEnvironment;
use casjobs_client::FileToken;
use casjobs_client::IdentityResolver;
use casjobs_client::JsonLineObserver;
use casjobs_client::KeystoneIdentityResolver;
use casjobs_client::NoopObserver;
use casjobs_client::TokenProvider;
use casjobs_client::WaitOptions;
use casjobs_client::client::DEFAULT_LOGIN_URI;
use casjobs_client::settings::COMPUTE_TOKEN_PATH;
use casjobs_client::settings::DEFAULT_CONTEXT;
use casjobs_client::settings::DEFAULT_MAX_RESPONSE_BYTES;
use casjobs_client::settings::DEFAULT_REST_URI;
use casjobs_client::settings::DEFAULT_TASK_NAME_PREFIX;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "casjobs.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CASJOBS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default environment variable holding the auth token.
pub(crate) const DEFAULT_TOKEN_ENV: &str = "SCISERVER_TOKEN";
/// Default request timeout in milliseconds.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 600_000;
/// Minimum request timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum request timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 3_600_000;
/// Default job poll interval in milliseconds.
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Minimum job poll interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 10;
/// Maximum job poll interval in milliseconds.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 600_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// CasJobs client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Service endpoints and transport limits.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Token sources.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Execution environment and task naming.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Job defaults.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Request logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// With no explicit path and no `CASJOBS_CONFIG`, a missing
    /// `casjobs.toml` yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if !explicit && err.kind() == io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => return Err(ConfigError::Io(format!("{}: {err}", resolved.display()))),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.service.validate()?;
        self.auth.validate()?;
        self.environment.validate()?;
        self.jobs.validate()?;
        Ok(())
    }

    /// Resolves SDK client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the REST URI is rejected.
    pub fn client_settings(&self) -> Result<ClientSettings, ConfigError> {
        let base = ClientSettings::for_uri(&self.service.rest_uri)
            .map_err(|err| ConfigError::Invalid(format!("service.rest_uri: {err}")))?;
        let user_agent =
            self.service.user_agent.clone().unwrap_or_else(|| base.user_agent.clone());
        Ok(ClientSettings {
            timeout: self.service.timeout(),
            max_response_bytes: self.service.max_response_bytes,
            user_agent,
            task_name_prefix: self.environment.task_name_prefix.clone(),
            environment: self.environment.mode.resolve(),
            ..base
        })
    }

    /// Resolves the token chain: the environment variable, then the token file.
    #[must_use]
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        let mut chain = ChainedToken::new().with(Arc::new(EnvToken::new(&self.auth.token_env)));
        if let Some(path) = &self.auth.token_file {
            chain = chain.with(Arc::new(FileToken::new(path.clone())));
        }
        Arc::new(chain)
    }

    /// Resolves the login-portal identity resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the resolver cannot be built.
    pub fn identity_resolver(&self) -> Result<Arc<dyn IdentityResolver>, ConfigError> {
        let resolver =
            KeystoneIdentityResolver::new(&self.service.login_uri, self.service.timeout())
                .map_err(|err| ConfigError::Invalid(format!("service.login_uri: {err}")))?;
        Ok(Arc::new(resolver))
    }

    /// Resolves the request telemetry observer.
    #[must_use]
    pub fn observer(&self) -> Arc<dyn ClientObserver> {
        match self.logging.requests {
            RequestLogging::Off => Arc::new(NoopObserver),
            RequestLogging::Stderr => Arc::new(JsonLineObserver::new(io::stderr())),
        }
    }

    /// Resolves default wait options for job polling.
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        let interval = Duration::from_millis(self.jobs.poll_interval_ms);
        let options = WaitOptions::default().with_poll_interval(interval);
        match self.jobs.max_wait_ms {
            Some(max_wait_ms) => options.with_timeout(Duration::from_millis(max_wait_ms)),
            None => options,
        }
    }

    /// Returns a client builder with every configured capability installed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when settings or the identity resolver cannot be
    /// resolved.
    pub fn client_builder(&self) -> Result<CasJobsClientBuilder, ConfigError> {
        Ok(CasJobsClient::builder(self.client_settings()?)
            .token_provider(self.token_provider())
            .identity_resolver(self.identity_resolver()?)
            .observer(self.observer()))
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Service endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// CasJobs REST base URI.
    #[serde(default = "default_rest_uri")]
    pub rest_uri: String,
    /// Login-portal token endpoint used for identity lookup.
    #[serde(default = "default_login_uri")]
    pub login_uri: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Optional user agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rest_uri: default_rest_uri(),
            login_uri: default_login_uri(),
            timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: None,
        }
    }
}

impl ServiceConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates service settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_uri("service.rest_uri", &self.rest_uri)?;
        validate_http_uri("service.login_uri", &self.login_uri)?;
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "service.timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}",
            )));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "service.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            return Err(ConfigError::Invalid("service.user_agent must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Token source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Environment variable holding the token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Optional file holding the token.
    #[serde(default = "default_token_file")]
    pub token_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            token_file: default_token_file(),
        }
    }
}

impl AuthConfig {
    /// Validates token sources.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut chars = self.token_env.chars();
        let valid_start =
            chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
        if !valid_start || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(ConfigError::Invalid(
                "auth.token_env must be a valid environment variable name".to_string(),
            ));
        }
        if let Some(path) = &self.token_file {
            validate_path_string("auth.token_file", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Execution environment selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMode {
    /// Detect the compute environment by its keystone token file.
    #[default]
    Auto,
    /// Always annotate requests as compute-originated.
    Compute,
    /// Always annotate requests as standalone.
    Standalone,
}

impl EnvironmentMode {
    /// Resolves the SDK execution environment.
    #[must_use]
    pub fn resolve(self) -> ExecutionEnvironment {
        match self {
            Self::Auto => ExecutionEnvironment::Auto(PathBuf::from(COMPUTE_TOKEN_PATH)),
            Self::Compute => ExecutionEnvironment::Compute,
            Self::Standalone => ExecutionEnvironment::Standalone,
        }
    }
}

/// Execution environment and task-name configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Environment mode.
    #[serde(default)]
    pub mode: EnvironmentMode,
    /// Task-name prefix reported to the service.
    #[serde(default = "default_task_name_prefix")]
    pub task_name_prefix: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            mode: EnvironmentMode::default(),
            task_name_prefix: default_task_name_prefix(),
        }
    }
}

impl EnvironmentConfig {
    /// Validates environment settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.task_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "environment.task_name_prefix must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// Job defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Context used when a command does not name one.
    #[serde(default = "default_context")]
    pub default_context: String,
    /// Pause between status polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Optional upper bound on a job wait in milliseconds.
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_context: default_context(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: None,
        }
    }
}

impl JobsConfig {
    /// Validates job defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_context.trim().is_empty() {
            return Err(ConfigError::Invalid("jobs.default_context must be non-empty".to_string()));
        }
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "jobs.poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and \
                 {MAX_POLL_INTERVAL_MS}",
            )));
        }
        if self.max_wait_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "jobs.max_wait_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Request log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLogging {
    /// No request logging.
    #[default]
    Off,
    /// JSON lines on stderr.
    Stderr,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Request log destination.
    #[serde(default)]
    pub requests: RequestLogging,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
///
/// The flag is true when the path was named explicitly.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} component too long")));
    }
    Ok(())
}

/// Validates an absolute http(s) URI without embedded credentials.
fn validate_http_uri(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid uri: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid(format!("{field} must not embed credentials")));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid(format!("{field} cannot carry a path")));
    }
    Ok(())
}

/// Default CasJobs REST URI.
fn default_rest_uri() -> String {
    DEFAULT_REST_URI.to_string()
}

/// Default login-portal URI.
fn default_login_uri() -> String {
    DEFAULT_LOGIN_URI.to_string()
}

/// Default request timeout in milliseconds.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default response size cap.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default token environment variable.
fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// Default token file.
fn default_token_file() -> Option<PathBuf> {
    Some(PathBuf::from(COMPUTE_TOKEN_PATH))
}

/// Default task-name prefix.
fn default_task_name_prefix() -> String {
    DEFAULT_TASK_NAME_PREFIX.to_string()
}

/// Default database context.
fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

/// Default poll interval in milliseconds.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
