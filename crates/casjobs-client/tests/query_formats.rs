// crates/casjobs-client/tests/query_formats.rs
// ============================================================================
// Module: Synchronous Query Tests
// Description: Format negotiation, decoding, export helpers, and failures.
// Purpose: Validate one request per query with the negotiated Accept header.
// Dependencies: casjobs-client, serde_json, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Runs quick queries against a mock service that answers according to the
//! Accept header, and checks how each format is decoded.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::fs;
use std::io::Read;

use casjobs_client::CasJobsClient;
use casjobs_client::CasJobsError;
use casjobs_client::Cell;
use casjobs_client::ClientSettings;
use casjobs_client::ExecutionEnvironment;
use casjobs_client::QueryOutput;
use casjobs_client::ResultFormat;
use casjobs_client::StaticToken;
use serde_json::json;

use crate::common::MockResponse;
use crate::common::MockServer;
use crate::common::RecordedRequest;
use crate::common::TEST_TOKEN;
use crate::common::anonymous_client_for;
use crate::common::client_for;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// CSV body served for text formats.
const CSV_BODY: &str = "objid,ra,flag\n1237,180.5,True\n1238,,False\n";
/// Payload served for FITS requests.
const FITS_BODY: &[u8] = b"SIMPLE  =                    T\x00\xff";

/// Answers according to the negotiated representation.
fn by_accept(request: &RecordedRequest) -> MockResponse {
    match request.header("Accept") {
        Some("application/json+array") => MockResponse::json(&json!({
            "Result": [{
                "TableName": "Table1",
                "Columns": ["objid", "ra"],
                "Data": [[1237, 180.5], [1238, null]]
            }]
        })),
        Some("text/plain") => MockResponse::text(200, CSV_BODY),
        Some("application/fits") => MockResponse::bytes(FITS_BODY.to_vec()),
        other => MockResponse::text(406, &format!("unexpected accept {other:?}")),
    }
}

// ============================================================================
// SECTION: Negotiation
// ============================================================================

#[test]
fn each_format_sends_one_request_with_its_accept_header() {
    for format in ResultFormat::ALL {
        let server = MockServer::start(by_accept);
        client_for(&server).execute_query("select 1", "MyDB", format).unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1, "{format}");
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "/RestApi/contexts/MyDB/query");
        assert_eq!(requests[0].header("Accept"), Some(format.accept_header()));
        assert_eq!(requests[0].header("Content-Type"), Some("application/json"));
        assert_eq!(requests[0].header("X-Auth-Token"), Some(TEST_TOKEN));
    }
}

#[test]
fn query_body_carries_sql_and_task_name() {
    let server = MockServer::start(by_accept);
    client_for(&server).execute_query("select top 1 * from T", "DR16", ResultFormat::Csv).unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.url, "/RestApi/contexts/DR16/query");
    assert_eq!(
        request.json(),
        json!({"Query": "select top 1 * from T", "TaskName": "SciScript-Rust.CasJobs.executeQuery"})
    );
}

#[test]
fn compute_environment_prefixes_task_name() {
    let server = MockServer::start(by_accept);
    let settings = ClientSettings {
        environment: ExecutionEnvironment::Compute,
        ..common::settings_for(server.base_uri())
    };
    let client = CasJobsClient::builder(settings)
        .token_provider(std::sync::Arc::new(StaticToken::new(TEST_TOKEN)))
        .build()
        .unwrap();
    client.execute_query("select 1", "MyDB", ResultFormat::Csv).unwrap();
    assert_eq!(
        server.requests()[0].json()["TaskName"],
        "Compute.SciScript-Rust.CasJobs.executeQuery"
    );
}

#[test]
fn anonymous_query_omits_token_header() {
    let server = MockServer::start(by_accept);
    anonymous_client_for(&server).execute_query("select 1", "DR16", ResultFormat::Csv).unwrap();
    assert_eq!(server.requests()[0].header("X-Auth-Token"), None);
}

#[test]
fn illegal_format_fails_before_any_request() {
    let server = MockServer::start(by_accept);
    let err = client_for(&server).execute_query_as("select 1", "MyDB", "xml").unwrap_err();
    assert!(matches!(err, CasJobsError::IllegalFormat(ref name) if name == "xml"));
    assert_eq!(server.request_count(), 0);
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

#[test]
fn pandas_builds_frame_from_result_set() {
    let server = MockServer::start(by_accept);
    let output = client_for(&server).execute_query_as("select 1", "MyDB", "pandas").unwrap();
    let QueryOutput::Frame(frame) = output else {
        panic!("expected frame output");
    };
    assert_eq!(frame.columns(), ["objid", "ra"]);
    assert_eq!(frame.get(0, "objid"), Some(&Cell::Int(1237)));
    assert_eq!(frame.get(0, "ra"), Some(&Cell::Float(180.5)));
    assert_eq!(frame.get(1, "ra"), Some(&Cell::Null));
}

#[test]
fn json_returns_record_untouched() {
    let server = MockServer::start(by_accept);
    let output = client_for(&server).execute_query("select 1", "MyDB", ResultFormat::Json).unwrap();
    let QueryOutput::Json(value) = output else {
        panic!("expected json output");
    };
    assert_eq!(value["Result"][0]["TableName"], "Table1");
}

#[test]
fn csv_and_readable_carry_same_text() {
    let server = MockServer::start(by_accept);
    let client = client_for(&server);
    let QueryOutput::Csv(csv) = client.execute_query("q", "MyDB", ResultFormat::Csv).unwrap()
    else {
        panic!("expected csv output");
    };
    let readable =
        client.execute_query("q", "MyDB", ResultFormat::Readable).unwrap().into_readable().unwrap();
    let mut text = String::new();
    readable.reader().read_to_string(&mut text).unwrap();
    assert_eq!(csv, CSV_BODY);
    assert_eq!(text, CSV_BODY);
}

#[test]
fn remote_failure_includes_status_and_body() {
    let server = MockServer::constant(MockResponse::text(500, "Invalid column name 'foo'."));
    let err = client_for(&server).execute_query("q", "MyDB", ResultFormat::Csv).unwrap_err();
    assert_eq!(err.status(), Some(500));
    let message = err.to_string();
    assert!(message.starts_with("Error when executing query"), "{message}");
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("Invalid column name 'foo'."), "{message}");
}

#[test]
fn oversized_response_is_rejected() {
    let server = MockServer::constant(MockResponse::text(200, &"x".repeat(4096)));
    let settings = ClientSettings {
        max_response_bytes: 1024,
        ..common::settings_for(server.base_uri())
    };
    let client = CasJobsClient::builder(settings).build().unwrap();
    let err = client.execute_query("q", "MyDB", ResultFormat::Csv).unwrap_err();
    assert!(matches!(err, CasJobsError::ResponseTooLarge { limit: 1024 }));
}

// ============================================================================
// SECTION: Export Helpers
// ============================================================================

#[test]
fn frame_from_query_promotes_index_column() {
    let server = MockServer::start(by_accept);
    let frame = client_for(&server).frame_from_query("q", "MyDB", Some(0)).unwrap();
    assert_eq!(frame.index_name(), Some("objid"));
    assert_eq!(frame.index_labels(), vec![Cell::Int(1237), Cell::Int(1238)]);
    assert_eq!(frame.columns(), ["ra", "flag"]);
    assert_eq!(frame.get(0, "flag"), Some(&Cell::Bool(true)));
    assert_eq!(frame.get(1, "ra"), Some(&Cell::Null));
}

#[test]
fn frame_from_query_rejects_out_of_range_index() {
    let server = MockServer::start(by_accept);
    let err = client_for(&server).frame_from_query("q", "MyDB", Some(9)).unwrap_err();
    assert!(matches!(err, CasJobsError::InvalidArgument(_)));
}

#[test]
fn array_from_query_drops_labels() {
    let server = MockServer::start(by_accept);
    let array = client_for(&server).array_from_query("q", "MyDB").unwrap();
    assert_eq!(array.shape(), (2, 3));
    assert_eq!(array.get(0, 0), Some(&Cell::Int(1237)));
    assert_eq!(array.row(1).unwrap()[2], Cell::Bool(false));
}

#[test]
fn fits_export_writes_exact_bytes() {
    let server = MockServer::start(by_accept);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.fits");
    fs::write(&path, vec![b'z'; 512]).unwrap();

    client_for(&server).fits_file_from_query(&path, "q", "MyDB").unwrap();
    assert_eq!(fs::read(&path).unwrap(), FITS_BODY);
    assert_eq!(server.requests()[0].header("Accept"), Some("application/fits"));
}

#[test]
fn fits_export_failure_leaves_no_file() {
    let server = MockServer::constant(MockResponse::text(500, "query failed"));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.fits");
    let err = client_for(&server).fits_file_from_query(&path, "q", "MyDB").unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(!path.exists());
}
