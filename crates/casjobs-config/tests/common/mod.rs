// crates/casjobs-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for casjobs-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::PathBuf;

use casjobs_config::ClientConfig;
use casjobs_config::ConfigError;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Returns a config with all defaults applied.
pub fn minimal_config() -> Result<ClientConfig, ConfigError> {
    ClientConfig::from_toml("")
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// Writes `content` to `casjobs.toml` inside `dir` and returns the path.
pub fn write_config(dir: &tempfile::TempDir, content: &[u8]) -> Result<PathBuf, String> {
    let path = dir.path().join("casjobs.toml");
    fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(path)
}
