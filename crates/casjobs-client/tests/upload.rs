// crates/casjobs-client/tests/upload.rs
// ============================================================================
// Module: Table Upload Tests
// Description: Frame serialization on upload and upload-then-fetch round trips.
// Purpose: Validate the upload request and index-label preservation.
// Dependencies: casjobs-client, tiny_http
// ============================================================================

//! ## Overview
//! The round-trip mock stores the uploaded CSV and serves it back to the next
//! text query, mimicking a table created and then selected.

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

use std::sync::Arc;
use std::sync::Mutex;

use casjobs_client::CasJobsError;
use casjobs_client::Cell;
use casjobs_client::DataFrame;

use crate::common::MockResponse;
use crate::common::MockServer;
use crate::common::TEST_TOKEN;
use crate::common::anonymous_client_for;
use crate::common::client_for;

/// Three-column frame with mixed cell types.
fn sample_frame() -> DataFrame {
    DataFrame::new(
        vec!["name".to_string(), "mag".to_string(), "seen".to_string()],
        vec![
            vec![Cell::from("vega"), Cell::from(0.0), Cell::from(true)],
            vec![Cell::from("m31, core"), Cell::Null, Cell::from(false)],
        ],
    )
    .unwrap()
}

#[test]
fn upload_frame_posts_csv_with_default_index_header() {
    let server = MockServer::constant(MockResponse::text(200, ""));
    client_for(&server).upload_frame(&sample_frame(), "Stars", "MyDB").unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/RestApi/contexts/MyDB/Tables/Stars");
    assert_eq!(request.header("X-Auth-Token"), Some(TEST_TOKEN));
    assert_eq!(
        request.text(),
        "index,name,mag,seen\n0,vega,0.0,True\n1,\"m31, core\",,False\n"
    );
}

#[test]
fn upload_frame_keeps_named_index() {
    let server = MockServer::constant(MockResponse::text(200, ""));
    let frame = sample_frame()
        .with_index(Some("objid".to_string()), vec![Cell::Int(10), Cell::Int(20)])
        .unwrap();
    client_for(&server).upload_frame(&frame, "Stars", "MyDB").unwrap();
    assert!(server.requests()[0].text().starts_with("objid,name,mag,seen\n10,"));
}

#[test]
fn upload_requires_token() {
    let server = MockServer::constant(MockResponse::text(200, ""));
    let err = anonymous_client_for(&server).upload_csv(b"a\n1\n".to_vec(), "T", "MyDB").unwrap_err();
    assert!(matches!(err, CasJobsError::NotLoggedIn));
    assert_eq!(server.request_count(), 0);
}

#[test]
fn upload_frame_requires_token() {
    let server = MockServer::constant(MockResponse::text(200, ""));
    let err = anonymous_client_for(&server).upload_frame(&sample_frame(), "T", "MyDB").unwrap_err();
    assert!(matches!(err, CasJobsError::NotLoggedIn));
    assert_eq!(server.request_count(), 0);
}

#[test]
fn upload_failure_reports_table() {
    let server = MockServer::constant(MockResponse::text(409, "table already exists"));
    let err = client_for(&server).upload_csv(b"a\n1\n".to_vec(), "Dup", "MyDB").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Dup"), "{message}");
    assert!(message.contains("409"), "{message}");
    assert!(message.contains("table already exists"), "{message}");
}

#[test]
fn uploaded_frame_round_trips_through_fetch() {
    let stored: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let server_store = Arc::clone(&stored);
    let server = MockServer::start(move |request| {
        if request.method == "POST" && request.url.contains("/Tables/") {
            *server_store.lock().unwrap() = request.body.clone();
            MockResponse::text(200, "")
        } else {
            MockResponse::bytes(server_store.lock().unwrap().clone())
        }
    });
    let client = client_for(&server);
    let original = sample_frame()
        .with_index(Some("star".to_string()), vec![Cell::from("a"), Cell::from("b")])
        .unwrap();

    client.upload_frame(&original, "Stars", "MyDB").unwrap();
    let fetched = client.frame_from_query("select * from Stars", "MyDB", Some(0)).unwrap();

    assert_eq!(fetched.index_name(), Some("star"));
    assert_eq!(fetched.index_labels(), vec![Cell::from("a"), Cell::from("b")]);
    assert_eq!(fetched.columns(), original.columns());
    assert_eq!(fetched.get(0, "name"), Some(&Cell::from("vega")));
    assert_eq!(fetched.get(0, "mag"), Some(&Cell::Float(0.0)));
    assert_eq!(fetched.get(1, "mag"), Some(&Cell::Null));
    assert_eq!(fetched.get(1, "seen"), Some(&Cell::Bool(false)));
    assert_eq!(fetched.get(1, "name"), Some(&Cell::from("m31, core")));
}
