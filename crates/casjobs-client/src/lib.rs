// crates/casjobs-client/src/lib.rs
// ============================================================================
// Module: CasJobs Client
// Description: Blocking client SDK for the CasJobs REST service.
// Purpose: Run queries, manage jobs, and move tables in and out of CasJobs.
// Dependencies: reqwest, serde, serde_json, csv, thiserror, url
// ============================================================================

//! ## Overview
//! This crate wraps the CasJobs REST API: identity and schema lookup, table
//! listing, synchronous queries in several result formats, asynchronous job
//! submission and polling, FITS and frame export, and CSV table upload.
//! Credentials and identity come from injected [`TokenProvider`] and
//! [`IdentityResolver`] capabilities; request telemetry goes to a
//! [`ClientObserver`].
//! Invariants:
//! - Operations that need a token fail with [`CasJobsError::NotLoggedIn`]
//!   before any network call.
//! - Any non-200 response becomes [`CasJobsError::Remote`] carrying the status
//!   code and body text.
//!
//! Security posture: tokens are sent only in the `X-Auth-Token` header and are
//! never written to telemetry.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod client;
pub mod error;
pub mod export;
pub mod format;
pub mod frame;
pub mod jobs;
pub mod query;
pub mod settings;
pub mod telemetry;
pub mod upload;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::ChainedToken;
pub use auth::EnvToken;
pub use auth::FileToken;
pub use auth::Identity;
pub use auth::IdentityResolver;
pub use auth::KeystoneIdentityResolver;
pub use auth::StaticIdentity;
pub use auth::StaticToken;
pub use auth::TokenProvider;
pub use client::CasJobsClient;
pub use client::CasJobsClientBuilder;
pub use client::TableDescriptor;
pub use error::CasJobsError;
pub use format::FitsBlob;
pub use format::QueryOutput;
pub use format::ResultFormat;
pub use format::TextResult;
pub use frame::Cell;
pub use frame::CellArray;
pub use frame::DataFrame;
pub use frame::RowIndex;
pub use jobs::CancelToken;
pub use jobs::ConsoleProgress;
pub use jobs::JobId;
pub use jobs::JobProgress;
pub use jobs::JobStatus;
pub use jobs::NoProgress;
pub use jobs::PollEvent;
pub use jobs::WaitOptions;
pub use settings::ClientSettings;
pub use settings::ExecutionEnvironment;
pub use telemetry::ClientObserver;
pub use telemetry::JsonLineObserver;
pub use telemetry::NoopObserver;
