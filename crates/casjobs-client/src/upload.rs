// crates/casjobs-client/src/upload.rs
// ============================================================================
// Module: Table Upload
// Description: Create tables in a database context from CSV data.
// Purpose: Serialize frames and post CSV bytes to the table endpoint.
// Dependencies: csv (via frame)
// ============================================================================

//! ## Overview
//! Uploads post CSV text to `/contexts/{ctx}/Tables/{table}`. Frames are
//! serialized with their index as the first column so the labels survive a
//! later fetch with `index_col = Some(0)`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::client::CasJobsClient;
use crate::client::Call;
use crate::client::Method;
use crate::error::CasJobsError;
use crate::frame::DataFrame;
use crate::telemetry::Operation;

// ============================================================================
// SECTION: Operations
// ============================================================================

impl CasJobsClient {
    /// Uploads a frame, index first, as a new table.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token,
    /// [`CasJobsError::Decode`] when serialization fails, and
    /// [`CasJobsError::Remote`] on a non-200 response.
    pub fn upload_frame(
        &self,
        frame: &DataFrame,
        table: &str,
        context: &str,
    ) -> Result<(), CasJobsError> {
        self.require_token()?;
        let csv = frame.to_csv()?;
        self.upload_csv(csv, table, context)
    }

    /// Uploads raw CSV bytes as a new table.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::NotLoggedIn`] without a token,
    /// [`CasJobsError::InvalidArgument`] for an empty table name, and
    /// [`CasJobsError::Remote`] on a non-200 response.
    pub fn upload_csv(
        &self,
        csv: Vec<u8>,
        table: &str,
        context: &str,
    ) -> Result<(), CasJobsError> {
        let token = self.require_token()?;
        if table.is_empty() {
            return Err(CasJobsError::InvalidArgument("table name is empty".to_string()));
        }
        self.round_trip(Call {
            operation: Operation::UploadTable,
            method: Method::Post,
            path: &["contexts", context, "Tables", table],
            accept: None,
            content_type: None,
            token: Some(&token),
            body: csv,
            action: format!("Error when uploading CSV data into CasJobs table {table}"),
        })?;
        Ok(())
    }
}
