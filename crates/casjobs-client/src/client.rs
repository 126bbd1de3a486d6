// crates/casjobs-client/src/client.rs
// ============================================================================
// Module: CasJobs Client
// Description: Blocking HTTP client for the CasJobs REST API.
// Purpose: Build authenticated requests and interpret responses uniformly.
// Dependencies: reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! [`CasJobsClient`] owns the HTTP client, settings, and injected capabilities.
//! Every operation is one request/response round trip through
//! `CasJobsClient::round_trip`, which enforces the size cap, records
//! telemetry, and maps any non-200 status to [`CasJobsError::Remote`].
//! Operations are grouped by concern in sibling modules (`query`, `jobs`,
//! `export`, `upload`); this module holds identity and table listing.
//! Invariants:
//! - Authenticated operations check the token before any network call.
//! - Redirects are not followed.
//! - Failed requests are never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::auth::IdentityResolver;
use crate::auth::KeystoneIdentityResolver;
use crate::auth::StaticToken;
use crate::auth::TokenProvider;
use crate::auth::require_token;
use crate::error::CasJobsError;
use crate::settings::ClientSettings;
use crate::telemetry::ClientObserver;
use crate::telemetry::NoopObserver;
use crate::telemetry::Operation;
use crate::telemetry::Outcome;
use crate::telemetry::RequestEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the auth token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
/// Default SciServer login-portal token endpoint.
pub const DEFAULT_LOGIN_URI: &str = "https://apps.sciserver.org/login-portal/keystone/v3/tokens";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Table descriptor returned by table listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Row count.
    #[serde(rename = "Rows", default)]
    pub rows: i64,
    /// Size in bytes.
    #[serde(rename = "Size", default)]
    pub size: i64,
    /// Creation timestamp as reported by the service.
    #[serde(rename = "Date", default)]
    pub date: Value,
}

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
}

impl Method {
    /// Returns the method name.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// Outbound request description.
pub(crate) struct Call<'a> {
    /// Operation label for telemetry.
    pub(crate) operation: Operation,
    /// HTTP method.
    pub(crate) method: Method,
    /// Path segments below the base URI.
    pub(crate) path: &'a [&'a str],
    /// Accept header, when negotiated.
    pub(crate) accept: Option<&'static str>,
    /// Content-Type header for the body.
    pub(crate) content_type: Option<&'static str>,
    /// Auth token, when available.
    pub(crate) token: Option<&'a str>,
    /// Request body.
    pub(crate) body: Vec<u8>,
    /// Description used in remote failure messages.
    pub(crate) action: String,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking CasJobs REST client.
///
/// # Invariants
/// - Holds no per-call state; safe to share across threads.
#[derive(Clone)]
pub struct CasJobsClient {
    /// Client settings.
    settings: ClientSettings,
    /// HTTP client used for outbound requests.
    http: Client,
    /// Auth token source.
    tokens: Arc<dyn TokenProvider>,
    /// Token to identity resolver.
    identity: Arc<dyn IdentityResolver>,
    /// Telemetry sink.
    observer: Arc<dyn ClientObserver>,
}

/// Builder for [`CasJobsClient`].
pub struct CasJobsClientBuilder {
    /// Client settings.
    settings: ClientSettings,
    /// Auth token source.
    tokens: Arc<dyn TokenProvider>,
    /// Optional identity resolver; defaults to the SciServer login portal.
    identity: Option<Arc<dyn IdentityResolver>>,
    /// Telemetry sink.
    observer: Arc<dyn ClientObserver>,
}

impl CasJobsClientBuilder {
    /// Sets the auth token source.
    #[must_use]
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets the identity resolver.
    #[must_use]
    pub fn identity_resolver(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the telemetry observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError`] when the HTTP client cannot be created.
    pub fn build(self) -> Result<CasJobsClient, CasJobsError> {
        let http = Client::builder()
            .timeout(self.settings.timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| CasJobsError::Transport(err.to_string()))?;
        let identity = match self.identity {
            Some(identity) => identity,
            None => Arc::new(KeystoneIdentityResolver::new(
                DEFAULT_LOGIN_URI,
                self.settings.timeout,
            )?),
        };
        Ok(CasJobsClient {
            settings: self.settings,
            http,
            tokens: self.tokens,
            identity,
            observer: self.observer,
        })
    }
}

impl CasJobsClient {
    /// Starts a builder with no token, the default identity resolver, and no
    /// telemetry.
    #[must_use]
    pub fn builder(settings: ClientSettings) -> CasJobsClientBuilder {
        CasJobsClientBuilder {
            settings,
            tokens: Arc::new(StaticToken::none()),
            identity: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Returns the client settings.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Returns the telemetry observer.
    pub(crate) fn observer(&self) -> &dyn ClientObserver {
        self.observer.as_ref()
    }

    /// Returns the current token, failing when the caller is not logged in.
    pub(crate) fn require_token(&self) -> Result<String, CasJobsError> {
        require_token(self.tokens.as_ref())
    }

    /// Returns the current token when one is available.
    pub(crate) fn optional_token(&self) -> Option<String> {
        self.tokens.token().filter(|token| !token.is_empty())
    }

    // ------------------------------------------------------------------------
    // Identity and tables
    // ------------------------------------------------------------------------

    /// Returns the caller's schema name in the scratch database, `wsid_<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token, the resolver's
    /// error when identity lookup fails, and [`CasJobsError::Remote`] when the
    /// profile endpoint rejects the request.
    pub fn schema_name(&self) -> Result<String, CasJobsError> {
        let token = self.require_token()?;
        let identity = self.identity.resolve(&token)?;
        let body = self.round_trip(Call {
            operation: Operation::SchemaName,
            method: Method::Get,
            path: &["users", identity.id.as_str()],
            accept: None,
            content_type: Some("application/json"),
            token: Some(&token),
            body: Vec::new(),
            action: "Error when getting schema name".to_string(),
        })?;
        let profile: Value = parse_json(&body)?;
        let id = match profile.get("WebServicesId") {
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            _ => {
                return Err(CasJobsError::Decode(
                    "user profile is missing WebServicesId".to_string(),
                ));
            }
        };
        Ok(format!("wsid_{id}"))
    }

    /// Lists the tables of a database context.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token and
    /// [`CasJobsError::Remote`] on a non-200 response.
    pub fn tables(&self, context: &str) -> Result<Vec<TableDescriptor>, CasJobsError> {
        let token = self.require_token()?;
        let body = self.round_trip(Call {
            operation: Operation::ListTables,
            method: Method::Get,
            path: &["contexts", context, "Tables"],
            accept: None,
            content_type: Some("application/json"),
            token: Some(&token),
            body: Vec::new(),
            action: format!("Error when getting table description from database context {context}"),
        })?;
        serde_json::from_slice(&body).map_err(|err| CasJobsError::Decode(err.to_string()))
    }

    // ------------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------------

    /// Builds the request URL from path segments below the base URI.
    pub(crate) fn endpoint(&self, path: &[&str]) -> Result<Url, CasJobsError> {
        let mut url = self.settings.rest_uri.clone();
        url.path_segments_mut()
            .map_err(|()| CasJobsError::InvalidUri("base uri cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    /// Sends one request and returns the body of a 200 response.
    pub(crate) fn round_trip(&self, call: Call<'_>) -> Result<Vec<u8>, CasJobsError> {
        let url = self.endpoint(call.path)?;
        let request_bytes = call.body.len();
        let mut request = self.request(call.method, url);
        if let Some(accept) = call.accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        if let Some(content_type) = call.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(token) = call.token {
            request = request.header(AUTH_TOKEN_HEADER, token);
        }
        if call.method != Method::Get {
            request = request.body(call.body);
        }

        let started = Instant::now();
        let mut event = RequestEvent {
            operation: call.operation,
            method: call.method.as_str(),
            status: None,
            outcome: Outcome::Transport,
            latency: started.elapsed(),
            request_bytes,
            response_bytes: 0,
        };
        let result = self.exchange(request, &mut event);
        event.latency = started.elapsed();
        self.observer.record_request(&event);

        let (status, body) = result?;
        if status != 200 {
            return Err(CasJobsError::Remote {
                action: call.action,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }

    /// Starts a request for the given method.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Put => self.http.put(url),
        }
    }

    /// Sends the request and reads the bounded body, filling in the event.
    fn exchange(
        &self,
        request: RequestBuilder,
        event: &mut RequestEvent,
    ) -> Result<(u16, Vec<u8>), CasJobsError> {
        let mut response =
            request.send().map_err(|err| CasJobsError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        event.status = Some(status);
        let body = read_response_limited(&mut response, self.settings.max_response_bytes)?;
        event.response_bytes = body.len();
        event.outcome = if status == 200 { Outcome::Ok } else { Outcome::Remote };
        Ok((status, body))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a JSON body.
pub(crate) fn parse_json(body: &[u8]) -> Result<Value, CasJobsError> {
    serde_json::from_slice(body).map_err(|err| CasJobsError::Decode(err.to_string()))
}

/// Reads the response body while enforcing a byte limit.
pub(crate) fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, CasJobsError> {
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| CasJobsError::ResponseTooLarge {
        limit: max_bytes,
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(CasJobsError::ResponseTooLarge {
            limit: max_bytes,
        });
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    response
        .take(limit)
        .read_to_end(&mut buf)
        .map_err(|err| CasJobsError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(CasJobsError::ResponseTooLarge {
            limit: max_bytes,
        });
    }
    Ok(buf)
}
