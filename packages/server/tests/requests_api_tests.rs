//! Bounds and radius queries through the HTTP surface.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use spatial_core::domains::requests::{
    BOUNDS_PROCEDURE, RADIUS_PROCEDURE, VALIDATE_GEOMETRIES_PROCEDURE,
};
use spatial_core::testing::{sample_row, MockBackend};
use supabase_client::{ErrorCode, SupabaseError};

use common::TestHarness;

const LA_BOUNDS: &str = "north=34.2&south=33.9&east=-118.1&west=-118.5";

#[tokio::test]
async fn bounds_query_returns_reshaped_rows() {
    let harness = TestHarness::with_backend(MockBackend::new().with_rpc_response(
        BOUNDS_PROCEDURE,
        json!([sample_row(34.05, -118.25), sample_row(34.06, -118.26)]),
    ));

    let (status, body) = harness
        .get(&format!("/api/requests/bounds?{LA_BOUNDS}&category=help-needed&limit=25"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["requests"][0]["user"]["full_name"], "Alex Kim");
    assert_eq!(body["requests"][0]["skills_required"], json!([]));

    let calls = harness.backend.rpc_calls();
    assert_eq!(calls.len(), 1);
    let (function, params) = &calls[0];
    assert_eq!(function, BOUNDS_PROCEDURE);
    assert_eq!(params["p_category"], "help-needed");
    assert_eq!(params["p_status"], "active");
    assert_eq!(params["p_limit"], 25);
}

#[tokio::test]
async fn inverted_bounds_are_rejected_and_logged() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .get("/api/requests/bounds?north=33.9&south=34.2&east=-118.1&west=-118.5")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "Please check your input and try again.");
    assert_eq!(
        body["details"],
        "Invalid bounds: north must be greater than south"
    );
    assert!(harness.backend.rpc_calls().is_empty());

    let (_, errors) = harness.get("/api/errors").await;
    assert_eq!(errors["errors"].as_array().unwrap().len(), 1);
    assert_eq!(errors["errors"][0]["code"], "VALIDATION_ERROR");
    assert_eq!(errors["errors"][0]["retryable"], false);
}

#[tokio::test]
async fn missing_query_parameters_are_validation_errors() {
    let harness = TestHarness::new();

    let (status, body) = harness.get("/api/requests/bounds?north=34.2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = harness.get("/api/requests/radius?lat=34&lng=-118").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("radius_meters or radius_miles"));
}

#[tokio::test]
async fn radius_in_miles_is_converted() {
    let harness = TestHarness::with_backend(
        MockBackend::new().with_rpc_response(RADIUS_PROCEDURE, json!([sample_row(34.0, -118.0)])),
    );

    let (status, body) = harness
        .get("/api/requests/radius?lat=34.0&lng=-118.0&radius_miles=2")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let calls = harness.backend.rpc_calls();
    assert_eq!(calls[0].0, RADIUS_PROCEDURE);
    assert_eq!(calls[0].1["radius_meters"], 3218.68);
    assert_eq!(calls[0].1["center_lat"], 34.0);
}

#[tokio::test]
async fn oversized_radius_never_reaches_backend() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .get("/api/requests/radius?lat=34&lng=-118&radius_meters=50001")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["details"],
        "Invalid radius: must be between 1 and 50000 meters"
    );
    assert!(harness.backend.rpc_calls().is_empty());
}

#[tokio::test]
async fn backend_failures_map_to_status_codes() {
    let cases = [
        (
            SupabaseError::Timeout {
                operation: BOUNDS_PROCEDURE.into(),
                timeout_ms: 10_000,
            },
            StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Timeout,
            "Request timed out. Please try again.",
        ),
        (
            SupabaseError::Network("connection refused".into()),
            StatusCode::BAD_GATEWAY,
            ErrorCode::NetworkError,
            "Network connection problem. Please try again.",
        ),
        (
            SupabaseError::Api {
                status: 401,
                code: ErrorCode::AuthError,
                message: "JWT expired".into(),
                details: None,
                hint: None,
            },
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthError,
            "Authentication failed. Please sign in again.",
        ),
    ];

    for (error, expected_status, code, message) in cases {
        let harness =
            TestHarness::with_backend(MockBackend::new().with_rpc_error(BOUNDS_PROCEDURE, error));

        let (status, body) = harness
            .get(&format!("/api/requests/bounds?{LA_BOUNDS}"))
            .await;

        assert_eq!(status, expected_status);
        assert_eq!(body["error"], code.as_str());
        assert_eq!(body["message"], message);

        let log = harness.state.errors.lock().await;
        assert_eq!(log.latest().unwrap().retryable, code.is_retryable());
    }
}

#[tokio::test]
async fn malformed_rows_are_internal_errors() {
    let harness = TestHarness::with_backend(
        MockBackend::new().with_rpc_response(BOUNDS_PROCEDURE, json!([{ "title": 7 }])),
    );

    let (status, body) = harness
        .get(&format!("/api/requests/bounds?{LA_BOUNDS}"))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "UNKNOWN_ERROR");
}

#[tokio::test]
async fn geometry_validation_report_is_passed_through() {
    let harness = TestHarness::with_backend(MockBackend::new().with_rpc_response(
        VALIDATE_GEOMETRIES_PROCEDURE,
        json!([{ "request_id": "a", "issue": "invalid SRID", "fixed": true }]),
    ));

    let (status, body) = harness
        .post_json("/api/requests/validate-geometries", json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["issue"], "invalid SRID");
}
