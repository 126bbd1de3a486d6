// crates/casjobs-client/src/jobs.rs
// ============================================================================
// Module: Asynchronous Jobs
// Description: Job submission, status lookup, and bounded waiting.
// Purpose: Drive the submit, poll, terminal-status lifecycle of queued queries.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Jobs are submitted with a PUT and tracked by integer id. The server is the
//! only source of truth for job state: the client keeps nothing between polls
//! and treats status values 3, 4 and 5 as terminal without interpreting them
//! further.
//! Invariants:
//! - [`CasJobsClient::wait_for_job`] sleeps a fixed interval between polls.
//! - Errors during polling propagate immediately; only "not yet terminal" is
//!   retried.
//! - Progress callbacks never change the result or the poll timing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::client::CasJobsClient;
use crate::client::Call;
use crate::client::Method;
use crate::client::parse_json;
use crate::error::CasJobsError;
use crate::format::ACCEPT_TEXT;
use crate::query::QueryRequest;
use crate::telemetry::Operation;
use crate::telemetry::WaitEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status values after which a job no longer changes.
pub const TERMINAL_STATUSES: [i64; 3] = [3, 4, 5];
/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Longest uninterrupted sleep while a cancel token is attached.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(25);
/// Progress indicator written while a job is pending.
const WAITING_TEXT: &str = "Waiting...";
/// Progress indicator written when a job finishes.
const DONE_TEXT: &str = "Done!";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Server-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    /// Wraps a raw job id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw job id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = CasJobsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| CasJobsError::Decode(format!("invalid job id: {}", value.trim())))
    }
}

/// Converts a float with no fractional part into an integer.
#[allow(clippy::cast_possible_truncation, reason = "Range is checked before the cast.")]
fn integral(value: f64) -> Option<i64> {
    let in_range = (-9.007_199_254_740_992e15..=9.007_199_254_740_992e15).contains(&value);
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

/// Returns true when `status` ends the job lifecycle.
#[must_use]
pub fn is_terminal_status(status: i64) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Job status record.
///
/// # Invariants
/// - `status` equals the record's `Status` field.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    /// Parsed `Status` value.
    status: i64,
    /// Full server record.
    record: Value,
}

impl JobStatus {
    /// Wraps a server record, reading its `Status` field.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when `Status` is missing or not an
    /// integer.
    pub fn from_record(record: Value) -> Result<Self, CasJobsError> {
        let status = match record.get("Status") {
            Some(Value::Number(number)) => number.as_i64().or_else(|| integral(number.as_f64()?)),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| CasJobsError::Decode("job record has no integer Status".to_string()))?;
        Ok(Self {
            status,
            record,
        })
    }

    /// Returns the status value.
    #[must_use]
    pub const fn status(&self) -> i64 {
        self.status
    }

    /// Returns true when the job will not change further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        is_terminal_status(self.status)
    }

    /// Returns the full server record.
    #[must_use]
    pub const fn record(&self) -> &Value {
        &self.record
    }

    /// Consumes the status and returns the server record.
    #[must_use]
    pub fn into_record(self) -> Value {
        self.record
    }
}

// ============================================================================
// SECTION: Wait Controls
// ============================================================================

/// Shared flag for cancelling a wait from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Set once cancellation is requested.
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Limits and timing for [`CasJobsClient::wait_for_job`].
///
/// The defaults poll every two seconds with no limit.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Pause between non-terminal polls.
    pub poll_interval: Duration,
    /// Give up once this much time has passed.
    pub timeout: Option<Duration>,
    /// Give up after this many polls.
    pub max_polls: Option<u32>,
    /// Cancellation flag checked between polls and during sleeps.
    pub cancel: Option<CancelToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            max_polls: None,
            cancel: None,
        }
    }
}

impl WaitOptions {
    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the overall timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the poll limit.
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Attaches a cancel token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

// ============================================================================
// SECTION: Progress
// ============================================================================

/// One status poll during a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollEvent {
    /// Job being waited on.
    pub job_id: JobId,
    /// One-based poll number.
    pub attempt: u32,
    /// Status observed by this poll.
    pub status: i64,
    /// True when this poll ends the wait.
    pub terminal: bool,
}

/// Receives one callback per status poll.
pub trait JobProgress {
    /// Called after each poll.
    fn on_poll(&mut self, event: &PollEvent);
}

impl<F: FnMut(&PollEvent)> JobProgress for F {
    fn on_poll(&mut self, event: &PollEvent) {
        self(event);
    }
}

/// Silent progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl JobProgress for NoProgress {
    fn on_poll(&mut self, _event: &PollEvent) {}
}

/// Console progress: a waiting marker redrawn with backspaces, then `Done!`.
#[derive(Debug)]
pub struct ConsoleProgress<W: Write> {
    /// Output stream.
    out: W,
    /// True once the initial marker was written.
    started: bool,
}

impl<W: Write> ConsoleProgress<W> {
    /// Creates console progress writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            started: false,
        }
    }

    /// Consumes the progress and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> JobProgress for ConsoleProgress<W> {
    fn on_poll(&mut self, event: &PollEvent) {
        let erase = "\u{8}".repeat(WAITING_TEXT.len());
        if !self.started {
            let _ = writeln!(self.out, "{WAITING_TEXT}");
            self.started = true;
        }
        let _ = writeln!(self.out, "{erase}");
        let _ = writeln!(self.out, "{WAITING_TEXT}");
        if event.terminal {
            let _ = writeln!(self.out, "{erase}");
            let _ = writeln!(self.out, "{DONE_TEXT}");
        }
        let _ = self.out.flush();
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl CasJobsClient {
    /// Submits an asynchronous query and returns its job id.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token,
    /// [`CasJobsError::Remote`] on a non-200 response, and
    /// [`CasJobsError::Decode`] when the body is not an integer.
    pub fn submit_job(&self, sql: &str, context: &str) -> Result<JobId, CasJobsError> {
        let token = self.require_token()?;
        let body = QueryRequest {
            query: sql,
            task_name: self.settings().task_name("submitJob"),
        }
        .to_bytes()?;
        let response = self.round_trip(Call {
            operation: Operation::SubmitJob,
            method: Method::Put,
            path: &["contexts", context, "jobs"],
            accept: Some(ACCEPT_TEXT),
            content_type: Some("application/json"),
            token: Some(&token),
            body,
            action: "Error when submitting a job".to_string(),
        })?;
        String::from_utf8_lossy(&response).parse()
    }

    /// Returns the status record of one job.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token,
    /// [`CasJobsError::Remote`] on a non-200 response, and
    /// [`CasJobsError::Decode`] when the record has no integer `Status`.
    pub fn job_status(&self, job_id: JobId) -> Result<JobStatus, CasJobsError> {
        let token = self.require_token()?;
        let id = job_id.to_string();
        let body = self.round_trip(Call {
            operation: Operation::JobStatus,
            method: Method::Get,
            path: &["jobs", id.as_str()],
            accept: None,
            content_type: Some("application/json"),
            token: Some(&token),
            body: Vec::new(),
            action: format!("Error when getting the status of job {job_id}"),
        })?;
        JobStatus::from_record(parse_json(&body)?)
    }

    /// Returns the status records of all previous jobs, as sent by the server.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token and
    /// [`CasJobsError::Remote`] on a non-200 response.
    pub fn job_history(&self) -> Result<Value, CasJobsError> {
        let token = self.require_token()?;
        let body = self.round_trip(Call {
            operation: Operation::JobHistory,
            method: Method::Get,
            path: &["jobs", ""],
            accept: None,
            content_type: Some("application/json"),
            token: Some(&token),
            body: Vec::new(),
            action: "Error when getting the status of all jobs".to_string(),
        })?;
        parse_json(&body)
    }

    /// Polls a job until it reaches a terminal status and returns that record.
    ///
    /// # Errors
    ///
    /// Returns the first polling error unchanged, [`CasJobsError::WaitTimedOut`]
    /// when a timeout or poll limit is reached, and
    /// [`CasJobsError::WaitCancelled`] when the cancel token fires.
    pub fn wait_for_job(
        &self,
        job_id: JobId,
        options: &WaitOptions,
        progress: &mut dyn JobProgress,
    ) -> Result<JobStatus, CasJobsError> {
        let started = Instant::now();
        let mut polls = 0_u32;
        let outcome = loop {
            if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                break Err(CasJobsError::WaitCancelled {
                    job_id,
                });
            }
            let status = match self.job_status(job_id) {
                Ok(status) => status,
                Err(err) => break Err(err),
            };
            polls = polls.saturating_add(1);
            let terminal = status.is_terminal();
            progress.on_poll(&PollEvent {
                job_id,
                attempt: polls,
                status: status.status(),
                terminal,
            });
            if terminal {
                break Ok(status);
            }
            if options.max_polls.is_some_and(|max| polls >= max) {
                break Err(CasJobsError::WaitTimedOut {
                    job_id,
                    polls,
                });
            }
            let mut pause = options.poll_interval;
            if let Some(timeout) = options.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    break Err(CasJobsError::WaitTimedOut {
                        job_id,
                        polls,
                    });
                }
                pause = pause.min(timeout - elapsed);
            }
            if !sleep_unless_cancelled(pause, options.cancel.as_ref()) {
                break Err(CasJobsError::WaitCancelled {
                    job_id,
                });
            }
        };
        self.observer().record_wait(&WaitEvent {
            job_id,
            polls,
            status: outcome.as_ref().ok().map(JobStatus::status),
            elapsed: started.elapsed(),
        });
        outcome
    }
}

/// Sleeps for `duration`; returns false if `cancel` fires first.
fn sleep_unless_cancelled(duration: Duration, cancel: Option<&CancelToken>) -> bool {
    let Some(cancel) = cancel else {
        thread::sleep(duration);
        return true;
    };
    let deadline = Instant::now().checked_add(duration);
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return true;
                }
                (deadline - now).min(CANCEL_CHECK_SLICE)
            }
            None => CANCEL_CHECK_SLICE,
        };
        thread::sleep(slice);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_accepts_numbers_and_numeric_strings() {
        let numeric = JobStatus::from_record(json!({"Status": 4, "JobID": 9})).unwrap();
        assert_eq!(numeric.status(), 4);
        assert!(numeric.is_terminal());
        let text = JobStatus::from_record(json!({"Status": "1"})).unwrap();
        assert_eq!(text.status(), 1);
        assert!(!text.is_terminal());
        let float = JobStatus::from_record(json!({"Status": 4.0})).unwrap();
        assert_eq!(float.status(), 4);
        assert!(JobStatus::from_record(json!({"Status": 4.5})).is_err());
        assert!(JobStatus::from_record(json!({"JobID": 9})).is_err());
    }

    #[test]
    fn only_three_four_five_are_terminal() {
        let terminal: Vec<i64> = (-1..10).filter(|status| is_terminal_status(*status)).collect();
        assert_eq!(terminal, vec![3, 4, 5]);
    }

    #[test]
    fn job_id_parses_trimmed_text() {
        assert_eq!("  12345\r\n".parse::<JobId>().unwrap(), JobId::new(12345));
        assert!("abc".parse::<JobId>().is_err());
    }

    #[test]
    fn console_progress_redraws_then_finishes() {
        let mut progress = ConsoleProgress::new(Vec::new());
        let job_id = JobId::new(1);
        progress.on_poll(&PollEvent {
            job_id,
            attempt: 1,
            status: 1,
            terminal: false,
        });
        progress.on_poll(&PollEvent {
            job_id,
            attempt: 2,
            status: 5,
            terminal: true,
        });
        let output = String::from_utf8(progress.into_inner()).unwrap();
        let erase = "\u{8}".repeat(WAITING_TEXT.len());
        assert_eq!(
            output,
            format!("Waiting...\n{erase}\nWaiting...\n{erase}\nWaiting...\n{erase}\nDone!\n")
        );
    }

    #[test]
    fn unbounded_sleep_still_observes_cancel() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let started = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::MAX, Some(&cancel)));
        canceller.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let started = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(5), Some(&cancel)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
