//! Test harness that drives the full router against mock collaborators.
//!
//! No network or backend is involved: procedures and edge functions are
//! answered by [`MockBackend`] and IP geolocation by [`StubLocator`].

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::Value;
use spatial_core::domains::clustering::ClusterOptions;
use spatial_core::domains::location::{LocationAccuracy, LocationData, LocationSource};
use spatial_core::server::{build_app, AppState};
use spatial_core::testing::{MockBackend, StubLocator};
use tower::ServiceExt;

/// Where [`StubLocator`] puts every public caller.
pub fn seattle() -> LocationData {
    LocationData {
        latitude: 47.6062,
        longitude: -122.3321,
        city: "Seattle".into(),
        country: "United States".into(),
        country_code: "US".into(),
        time_zone: "America/Los_Angeles".into(),
        accuracy: LocationAccuracy::Medium,
        source: LocationSource::Ip,
    }
}

#[allow(dead_code)]
pub struct TestHarness {
    pub backend: MockBackend,
    pub locator: StubLocator,
    pub state: AppState,
    app: Router,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new() -> Self {
        Self::with_backend(MockBackend::new())
    }

    pub fn with_backend(backend: MockBackend) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let locator = StubLocator::new(seattle());
        let state = AppState::new(
            Arc::new(backend.clone()),
            Arc::new(locator.clone()),
            ClusterOptions::default(),
        );
        let app = build_app(state.clone(), &[]);

        Self {
            backend,
            locator,
            state,
            app,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is JSON")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, body).await
    }

    pub async fn patch_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("PATCH", uri, body).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}
