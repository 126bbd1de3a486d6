// crates/casjobs-client/src/export.rs
// ============================================================================
// Module: Result Export
// Description: Convenience conversions of synchronous query results.
// Purpose: Save FITS results to disk and load CSV results into frames.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Export helpers are thin wrappers over [`CasJobsClient::execute_query`].
//! FITS bodies are fully received before the target file is opened, so a
//! failed request never leaves a file behind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::client::CasJobsClient;
use crate::error::CasJobsError;
use crate::format::ResultFormat;
use crate::frame::CellArray;
use crate::frame::DataFrame;

// ============================================================================
// SECTION: Operations
// ============================================================================

impl CasJobsClient {
    /// Runs a query in FITS format and writes the result to `path`.
    ///
    /// An existing file is truncated. When the write fails the partial file
    /// is removed.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::execute_query`] and
    /// [`CasJobsError::Io`] when the file cannot be written.
    pub fn fits_file_from_query(
        &self,
        path: &Path,
        sql: &str,
        context: &str,
    ) -> Result<(), CasJobsError> {
        let blob = self.execute_query(sql, context, ResultFormat::Fits)?.into_fits()?;
        write_file(path, blob.as_bytes())
    }

    /// Runs a query and parses the CSV result into a frame.
    ///
    /// `index_col` promotes that column to the row index.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::execute_query`],
    /// [`CasJobsError::Decode`] for malformed CSV, and
    /// [`CasJobsError::InvalidArgument`] for an out-of-range index column.
    pub fn frame_from_query(
        &self,
        sql: &str,
        context: &str,
        index_col: Option<usize>,
    ) -> Result<DataFrame, CasJobsError> {
        let text = self.execute_query(sql, context, ResultFormat::Readable)?.into_readable()?;
        DataFrame::from_csv(text.reader(), index_col)
    }

    /// Runs a query and returns only the cell values.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::frame_from_query`].
    pub fn array_from_query(&self, sql: &str, context: &str) -> Result<CellArray, CasJobsError> {
        Ok(self.frame_from_query(sql, context, None)?.to_array())
    }
}

/// Writes `bytes` to `path`, removing the file if the write does not finish.
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CasJobsError> {
    let io_error = |source| CasJobsError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(path).map_err(io_error)?;
    if let Err(err) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(io_error(err));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
