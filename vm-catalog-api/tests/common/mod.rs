//! Common test utilities and helpers for vm-catalog-api tests
//!
//! Every test gets a fresh in-memory catalog with the `default` network and
//! storage pool seeded and a static media table containing [`MOCK_ISO`].

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vm_catalog::test_utils::{create_test_catalog_with_media, StaticMediaInspector};

pub use vm_catalog::test_utils::{MOCK_ISO, TEST_HOST_MEMORY_MIB};

pub const DEFAULT_POOL: &str = "/api/v1/storagepools/default";

/// Helper to extract JSON body from axum response
pub async fn extract_json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Response has no Location header")
        .to_str()
        .expect("Location header is not ASCII")
        .to_string()
}

/// Minimal template payload backed by the mock ISO
pub fn iso_template(name: &str) -> Value {
    json!({
        "name": name,
        "source_media": {"type": "disk", "path": MOCK_ISO}
    })
}

/// TestClient to encapsulate API interaction logic
pub struct TestClient {
    pub app: Router,
    pub media: Arc<StaticMediaInspector>,
}

impl TestClient {
    pub async fn new() -> Self {
        let (catalog, media) = create_test_catalog_with_media().await;
        Self {
            app: vm_catalog_api::create_app(catalog),
            media,
        }
    }

    /// Send a request to the API
    pub async fn send_request(&self, request: Request<Body>) -> Response<Body> {
        // Clone the app to allow reuse (Router is cheap to clone)
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn send_json(&self, method: &str, uri: &str, body: &Value) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send_request(request).await
    }

    async fn send_empty(&self, method: &str, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send_empty("GET", uri).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("POST", uri, body).await
    }

    /// POST without a body, as used by action endpoints
    pub async fn action(&self, uri: &str) -> Response<Body> {
        self.send_empty("POST", uri).await
    }

    pub async fn put(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("PUT", uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send_empty("DELETE", uri).await
    }

    /// GET and decode, asserting a 200
    pub async fn get_json(&self, uri: &str) -> Value {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
        extract_json_body(response).await
    }

    /// Assert the response is a 400 carrying `code`
    pub async fn assert_rejected(response: Response<Body>, code: &str) -> Value {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json_body(response).await;
        assert_eq!(body["code"], code, "unexpected error body: {}", body);
        assert!(body["reason"].as_str().unwrap().starts_with(code));
        body
    }
}
