// crates/casjobs-client/tests/common/mod.rs
// ============================================================================
// Module: Client Test Helpers
// Description: Recording mock CasJobs server and client builders.
// Purpose: Share tiny_http fixtures across client integration tests.
// Dependencies: casjobs-client, tiny_http
// ============================================================================

//! ## Overview
//! [`MockServer`] answers every request with a handler-chosen response and
//! records method, URL, headers, and body for later assertions.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use casjobs_client::CasJobsClient;
use casjobs_client::ClientSettings;
use casjobs_client::ExecutionEnvironment;
use casjobs_client::StaticIdentity;
use casjobs_client::StaticToken;
use serde_json::Value;
use tiny_http::Response;
use tiny_http::Server;

/// Token used by authenticated test clients.
pub const TEST_TOKEN: &str = "token-abc";

// ============================================================================
// SECTION: Recorded Requests
// ============================================================================

/// Request observed by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request target, path plus query.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Returns the first header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Returns the body as text.
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

/// Response the mock server sends back.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// 200 response carrying a JSON value.
    pub fn json(value: &Value) -> Self {
        Self {
            status: 200,
            body: serde_json::to_vec(value).unwrap(),
        }
    }

    /// Response with a text body.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    /// 200 response with raw bytes.
    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
        }
    }
}

// ============================================================================
// SECTION: Mock Server
// ============================================================================

/// Recording HTTP server bound to an ephemeral local port.
pub struct MockServer {
    /// Base URI, `http://127.0.0.1:<port>/RestApi`.
    base_uri: String,
    /// Requests in arrival order.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Set on drop to stop the accept loop.
    stop: Arc<AtomicBool>,
    /// Accept loop thread.
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Starts a server that answers each request with `handler`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let thread_requests = Arc::clone(&requests);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_millis(20)) else {
                    continue;
                };
                let mut body = Vec::new();
                let _ = request.as_reader().read_to_end(&mut body);
                let recorded = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| {
                            (
                                header.field.as_str().as_str().to_string(),
                                header.value.as_str().to_string(),
                            )
                        })
                        .collect(),
                    body,
                };
                let reply = handler(&recorded);
                thread_requests.lock().unwrap().push(recorded);
                let _ =
                    request.respond(Response::from_data(reply.body).with_status_code(reply.status));
            }
        });
        Self {
            base_uri: format!("http://{addr}/RestApi"),
            requests,
            stop,
            handle: Some(handle),
        }
    }

    /// Starts a server that answers every request with the same response.
    pub fn constant(response: MockResponse) -> Self {
        Self::start(move |_| response.clone())
    }

    /// Returns the REST base URI served by this mock.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Returns a snapshot of the recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the number of recorded requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// SECTION: Client Builders
// ============================================================================

/// Settings pointing at `base_uri` and reporting a standalone environment.
pub fn settings_for(base_uri: &str) -> ClientSettings {
    ClientSettings {
        environment: ExecutionEnvironment::Standalone,
        timeout: Duration::from_secs(5),
        ..ClientSettings::for_uri(base_uri).unwrap()
    }
}

/// Authenticated client with a fixed identity.
pub fn client_for(server: &MockServer) -> CasJobsClient {
    CasJobsClient::builder(settings_for(server.base_uri()))
        .token_provider(Arc::new(StaticToken::new(TEST_TOKEN)))
        .identity_resolver(Arc::new(StaticIdentity::new("user-123")))
        .build()
        .unwrap()
}

/// Client without any token.
pub fn anonymous_client_for(server: &MockServer) -> CasJobsClient {
    CasJobsClient::builder(settings_for(server.base_uri()))
        .identity_resolver(Arc::new(StaticIdentity::new("user-123")))
        .build()
        .unwrap()
}
