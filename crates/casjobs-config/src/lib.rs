// crates/casjobs-config/src/lib.rs
// ============================================================================
// Module: CasJobs Config Library
// Description: Configuration model, validation, and SDK resolution.
// Purpose: Single source of truth for casjobs.toml semantics.
// Dependencies: casjobs-client, serde, toml, url
// ============================================================================

//! ## Overview
//! `casjobs-config` defines the configuration model for the CasJobs client.
//! It provides strict, fail-closed validation and resolves a validated file
//! into client settings, token providers, and wait options.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
