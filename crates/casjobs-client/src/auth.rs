// crates/casjobs-client/src/auth.rs
// ============================================================================
// Module: CasJobs Credentials
// Description: Token and identity capabilities injected into the client.
// Purpose: Replace ambient session state with explicit, substitutable providers.
// Dependencies: reqwest, serde
// ============================================================================

//! ## Overview
//! The client never reads a process-wide session. Callers inject a
//! [`TokenProvider`] that yields the current auth token and an
//! [`IdentityResolver`] that maps a token to the caller's keystone identity.
//! Invariants:
//! - An empty token is treated the same as a missing token.
//! - Providers are read-only; the client never refreshes or stores tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use url::Url;

use crate::client::read_response_limited;
use crate::error::CasJobsError;

/// Largest login-portal response accepted by [`KeystoneIdentityResolver`].
pub const MAX_IDENTITY_RESPONSE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Token Providers
// ============================================================================

/// Supplies the caller's current auth token.
pub trait TokenProvider: Send + Sync {
    /// Returns the token, or `None` when the caller is not logged in.
    fn token(&self) -> Option<String>;
}

/// Fixed token supplied at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    /// Token value; `None` models a logged-out session.
    token: Option<String>,
}

impl StaticToken {
    /// Creates a provider that always yields `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Creates a provider with no token.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            token: None,
        }
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Token read from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    /// Variable name.
    var: String,
}

impl EnvToken {
    /// Creates a provider reading `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
        }
    }
}

impl TokenProvider for EnvToken {
    fn token(&self) -> Option<String> {
        env::var(&self.var).ok().map(|value| value.trim().to_string())
    }
}

/// Token read from a file, such as the compute keystone token file.
#[derive(Debug, Clone)]
pub struct FileToken {
    /// Token file path.
    path: PathBuf,
}

impl FileToken {
    /// Creates a provider reading the token stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }
}

impl TokenProvider for FileToken {
    fn token(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok().map(|value| value.trim().to_string())
    }
}

/// Tries each provider in order and returns the first non-empty token.
#[derive(Clone, Default)]
pub struct ChainedToken {
    /// Providers in priority order.
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainedToken {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider to the chain.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl TokenProvider for ChainedToken {
    fn token(&self) -> Option<String> {
        self.providers
            .iter()
            .filter_map(|provider| provider.token())
            .find(|token| !token.is_empty())
    }
}

/// Returns the provider's token, failing when it is missing or empty.
pub(crate) fn require_token(provider: &dyn TokenProvider) -> Result<String, CasJobsError> {
    match provider.token() {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(CasJobsError::NotLoggedIn),
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Keystone identity of the token holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Keystone user id.
    pub id: String,
    /// Login name, when the resolver reports one.
    pub name: Option<String>,
}

/// Resolves a token into the caller's identity.
pub trait IdentityResolver: Send + Sync {
    /// Resolves `token` into an identity.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError`] when the identity cannot be resolved.
    fn resolve(&self, token: &str) -> Result<Identity, CasJobsError>;
}

/// Resolver returning a fixed identity regardless of token.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    /// Identity returned for every token.
    identity: Identity,
}

impl StaticIdentity {
    /// Creates a resolver that always yields the given user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                id: id.into(),
                name: None,
            },
        }
    }
}

impl IdentityResolver for StaticIdentity {
    fn resolve(&self, _token: &str) -> Result<Identity, CasJobsError> {
        Ok(self.identity.clone())
    }
}

/// Login-portal token lookup response.
#[derive(Debug, Deserialize)]
struct KeystoneTokenResponse {
    /// Token record.
    token: KeystoneToken,
}

/// Token record within a login-portal response.
#[derive(Debug, Deserialize)]
struct KeystoneToken {
    /// Token owner.
    user: KeystoneUser,
}

/// Token owner within a login-portal response.
#[derive(Debug, Deserialize)]
struct KeystoneUser {
    /// Keystone user id.
    id: String,
    /// Login name.
    #[serde(default)]
    name: Option<String>,
}

/// Resolves identities through the SciServer login portal (`GET {login_uri}/{token}`).
#[derive(Debug, Clone)]
pub struct KeystoneIdentityResolver {
    /// Login-portal token endpoint.
    login_uri: Url,
    /// HTTP client used for lookups.
    client: Client,
    /// Largest accepted login-portal response.
    max_response_bytes: usize,
}

impl KeystoneIdentityResolver {
    /// Builds a resolver for the given login-portal token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError`] when the URI is invalid or the HTTP client
    /// cannot be built.
    pub fn new(login_uri: &str, timeout: Duration) -> Result<Self, CasJobsError> {
        let login_uri =
            Url::parse(login_uri).map_err(|err| CasJobsError::InvalidUri(err.to_string()))?;
        if login_uri.cannot_be_a_base() {
            return Err(CasJobsError::InvalidUri("login uri cannot carry a path".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| CasJobsError::Transport(err.to_string()))?;
        Ok(Self {
            login_uri,
            client,
            max_response_bytes: MAX_IDENTITY_RESPONSE_BYTES,
        })
    }

    /// Overrides the response size cap.
    #[must_use]
    pub const fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }
}

impl IdentityResolver for KeystoneIdentityResolver {
    fn resolve(&self, token: &str) -> Result<Identity, CasJobsError> {
        let mut url = self.login_uri.clone();
        url.path_segments_mut()
            .map_err(|()| CasJobsError::InvalidUri("login uri cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(token);
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|err| CasJobsError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = read_response_limited(&mut response, self.max_response_bytes)?;
        if status != 200 {
            return Err(CasJobsError::Remote {
                action: "Error when resolving user identity".to_string(),
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let parsed: KeystoneTokenResponse =
            serde_json::from_slice(&body).map_err(|err| CasJobsError::Decode(err.to_string()))?;
        Ok(Identity {
            id: parsed.token.user.id,
            name: parsed.token.user.name,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_tokens_count_as_logged_out() {
        assert!(matches!(require_token(&StaticToken::none()), Err(CasJobsError::NotLoggedIn)));
        assert!(matches!(require_token(&StaticToken::new("")), Err(CasJobsError::NotLoggedIn)));
        assert_eq!(require_token(&StaticToken::new("abc")).unwrap(), "abc");
    }

    #[test]
    fn chained_token_skips_empty_providers() {
        let chain = ChainedToken::new()
            .with(Arc::new(StaticToken::none()))
            .with(Arc::new(StaticToken::new("")))
            .with(Arc::new(StaticToken::new("second")));
        assert_eq!(chain.token().as_deref(), Some("second"));
        assert_eq!(ChainedToken::new().token(), None);
    }

    #[test]
    fn file_token_trims_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token-from-file").unwrap();
        let provider = FileToken::new(file.path());
        assert_eq!(provider.token().as_deref(), Some("token-from-file"));
        assert_eq!(FileToken::new("/nonexistent/keystone.token").token(), None);
    }
}
