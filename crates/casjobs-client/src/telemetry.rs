// crates/casjobs-client/src/telemetry.rs
// ============================================================================
// Module: CasJobs Telemetry
// Description: Observation hooks for CasJobs requests and job waits.
// Purpose: Emit structured request records without a global logger.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! The client reports each HTTP round trip and each finished job wait to a
//! [`ClientObserver`]. [`NoopObserver`] discards events; [`JsonLineObserver`]
//! writes one JSON object per line to any writer.
//! Security posture: auth tokens and SQL text are never part of an event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::jobs::JobId;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Client operation classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Identity lookup for the schema name.
    SchemaName,
    /// Table listing.
    ListTables,
    /// Synchronous query.
    ExecuteQuery,
    /// Asynchronous job submission.
    SubmitJob,
    /// Single job status lookup.
    JobStatus,
    /// Job history lookup.
    JobHistory,
    /// Table upload.
    UploadTable,
}

impl Operation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaName => "schema_name",
            Self::ListTables => "list_tables",
            Self::ExecuteQuery => "execute_query",
            Self::SubmitJob => "submit_job",
            Self::JobStatus => "job_status",
            Self::JobHistory => "job_history",
            Self::UploadTable => "upload_table",
        }
    }
}

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// HTTP 200.
    Ok,
    /// The service answered with another status.
    Remote,
    /// No response was received.
    Transport,
}

impl Outcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Remote => "remote_error",
            Self::Transport => "transport_error",
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// One HTTP round trip.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Client operation.
    pub operation: Operation,
    /// HTTP method.
    pub method: &'static str,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Outcome classification.
    pub outcome: Outcome,
    /// Wall time from send to body read.
    pub latency: Duration,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// End of a job wait.
#[derive(Debug, Clone)]
pub struct WaitEvent {
    /// Job waited on.
    pub job_id: JobId,
    /// Number of status polls issued.
    pub polls: u32,
    /// Terminal status, when one was reached.
    pub status: Option<i64>,
    /// Total wait time.
    pub elapsed: Duration,
}

// ============================================================================
// SECTION: Observer Trait
// ============================================================================

/// Receives client telemetry events.
pub trait ClientObserver: Send + Sync {
    /// Records one HTTP round trip.
    fn record_request(&self, event: &RequestEvent);
    /// Records the end of a job wait.
    fn record_wait(&self, event: &WaitEvent);
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ClientObserver for NoopObserver {
    fn record_request(&self, _event: &RequestEvent) {}

    fn record_wait(&self, _event: &WaitEvent) {}
}

/// Observer writing JSON lines.
pub struct JsonLineObserver<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLineObserver<W> {
    /// Creates an observer writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the observer and returns the writer.
    ///
    /// Returns `None` when the writer mutex was poisoned.
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }

    /// Writes one record; telemetry failures never fail the client call.
    fn write(&self, record: &serde_json::Value) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if serde_json::to_writer(&mut *guard, record).is_ok() {
            let _ = guard.write_all(b"\n");
            let _ = guard.flush();
        }
    }
}

impl<W: Write + Send> ClientObserver for JsonLineObserver<W> {
    fn record_request(&self, event: &RequestEvent) {
        self.write(&json!({
            "event": "casjobs_request",
            "operation": event.operation.as_str(),
            "method": event.method,
            "status": event.status,
            "outcome": event.outcome.as_str(),
            "latency_ms": u64::try_from(event.latency.as_millis()).unwrap_or(u64::MAX),
            "request_bytes": event.request_bytes,
            "response_bytes": event.response_bytes,
        }));
    }

    fn record_wait(&self, event: &WaitEvent) {
        self.write(&json!({
            "event": "casjobs_job_wait",
            "job_id": event.job_id.get(),
            "polls": event.polls,
            "status": event.status,
            "elapsed_ms": u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX),
        }));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn json_line_observer_writes_one_record_per_event() {
        let observer = JsonLineObserver::new(Vec::new());
        observer.record_request(&RequestEvent {
            operation: Operation::ExecuteQuery,
            method: "POST",
            status: Some(500),
            outcome: Outcome::Remote,
            latency: Duration::from_millis(12),
            request_bytes: 40,
            response_bytes: 3,
        });
        observer.record_wait(&WaitEvent {
            job_id: JobId::new(77),
            polls: 4,
            status: Some(5),
            elapsed: Duration::from_secs(6),
        });
        let output = String::from_utf8(observer.into_inner().unwrap()).unwrap();
        let lines: Vec<Value> =
            output.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["operation"], "execute_query");
        assert_eq!(lines[0]["status"], 500);
        assert_eq!(lines[0]["outcome"], "remote_error");
        assert_eq!(lines[1]["job_id"], 77);
        assert_eq!(lines[1]["elapsed_ms"], 6000);
    }
}
