// crates/casjobs-client/src/query.rs
// ============================================================================
// Module: Synchronous Queries
// Description: Quick-query execution against a database context.
// Purpose: Negotiate the result representation and decode the response.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A synchronous query is a single POST to `/contexts/{ctx}/query`. The
//! [`ResultFormat`] picks the Accept header and the decoder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::client::CasJobsClient;
use crate::client::Call;
use crate::client::Method;
use crate::error::CasJobsError;
use crate::format::QueryOutput;
use crate::format::ResultFormat;
use crate::telemetry::Operation;

// ============================================================================
// SECTION: Request Body
// ============================================================================

/// JSON body shared by quick queries and job submissions.
#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    /// SQL text.
    #[serde(rename = "Query")]
    pub(crate) query: &'a str,
    /// Task-name annotation.
    #[serde(rename = "TaskName")]
    pub(crate) task_name: String,
}

impl QueryRequest<'_> {
    /// Serializes the body.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, CasJobsError> {
        serde_json::to_vec(self).map_err(|err| CasJobsError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl CasJobsClient {
    /// Executes a synchronous query and decodes the result in `format`.
    ///
    /// The auth token is attached when available; without one the query is
    /// sent anonymously, which public contexts accept.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Remote`] on a non-200 response and
    /// [`CasJobsError::Decode`] when the body does not match `format`.
    pub fn execute_query(
        &self,
        sql: &str,
        context: &str,
        format: ResultFormat,
    ) -> Result<QueryOutput, CasJobsError> {
        let token = self.optional_token();
        let body = QueryRequest {
            query: sql,
            task_name: self.settings().task_name("executeQuery"),
        }
        .to_bytes()?;
        let response = self.round_trip(Call {
            operation: Operation::ExecuteQuery,
            method: Method::Post,
            path: &["contexts", context, "query"],
            accept: Some(format.accept_header()),
            content_type: Some("application/json"),
            token: token.as_deref(),
            body,
            action: "Error when executing query".to_string(),
        })?;
        format.decode(response)
    }

    /// Executes a synchronous query with a textual format name.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::IllegalFormat`] for an unknown format before any
    /// request is sent, otherwise the errors of [`Self::execute_query`].
    pub fn execute_query_as(
        &self,
        sql: &str,
        context: &str,
        format: &str,
    ) -> Result<QueryOutput, CasJobsError> {
        let format = format.parse::<ResultFormat>()?;
        self.execute_query(sql, context, format)
    }
}
