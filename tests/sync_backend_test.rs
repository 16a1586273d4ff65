// End-to-end tests for the token sync client against a stub backend.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use flowsync::error::Result;
use flowsync::harvest::{CookieSource, SessionToken};
use flowsync::sync::{sync_from_cookies, SyncClient, SyncOutcome};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct StubBackend {
    status: StatusCode,
    body: serde_json::Value,
    requests: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

impl StubBackend {
    fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn sync_handler(
    State(stub): State<StubBackend>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    stub.requests.lock().unwrap().push((auth, body));
    (stub.status, Json(stub.body.clone()))
}

/// Serve the stub on an ephemeral port; returns its base URL
async fn spawn_backend(stub: StubBackend) -> String {
    let app = Router::new()
        .route("/api/tokens/sync", post(sync_handler))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn success_body() -> serde_json::Value {
    json!({"success": true, "data": {"email": "a@b.com", "action": "created"}})
}

struct FixedCookies(Vec<String>);

#[async_trait]
impl CookieSource for FixedCookies {
    async fn cookie_values(&self, _name: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn sync_posts_token_with_bearer_auth() {
    let stub = StubBackend::new(StatusCode::OK, success_body());
    let base_url = spawn_backend(stub.clone()).await;

    let client = SyncClient::new(base_url, "test-key");
    let outcome = client.sync(&SessionToken::new("tok_XYZ")).await;

    assert_eq!(
        outcome,
        SyncOutcome::Accepted {
            email: "a@b.com".to_string(),
            action: "created".to_string(),
        }
    );

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(*body, json!({"st": "tok_XYZ"}));
}

#[tokio::test]
async fn sync_reports_backend_failure_without_retry() {
    let stub = StubBackend::new(StatusCode::OK, json!({"success": false, "error": "bad st"}));
    let base_url = spawn_backend(stub.clone()).await;

    let client = SyncClient::new(base_url, "test-key");
    let outcome = client.sync(&SessionToken::new("tok_bad")).await;

    assert_eq!(outcome, SyncOutcome::Rejected);
    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn sync_reports_http_error() {
    let stub = StubBackend::new(StatusCode::UNAUTHORIZED, json!({"detail": "bad key"}));
    let base_url = spawn_backend(stub.clone()).await;

    let client = SyncClient::new(base_url, "wrong-key");
    let outcome = client.sync(&SessionToken::new("tok_XYZ")).await;

    assert_eq!(outcome, SyncOutcome::Failed);
    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn sync_tolerates_malformed_response() {
    let stub = StubBackend::new(StatusCode::OK, json!("not an object"));
    let base_url = spawn_backend(stub.clone()).await;

    let client = SyncClient::new(base_url, "test-key");
    let outcome = client.sync(&SessionToken::new("tok_XYZ")).await;

    assert_eq!(outcome, SyncOutcome::Rejected);
}

#[tokio::test]
async fn harvested_cookie_is_synced_exactly_once() {
    let stub = StubBackend::new(StatusCode::OK, success_body());
    let base_url = spawn_backend(stub.clone()).await;
    let client = SyncClient::new(base_url, "test-key");

    let source = FixedCookies(vec!["tok_XYZ".to_string(), "tok_other".to_string()]);
    let outcome = sync_from_cookies(&source, &client).await;

    assert!(matches!(outcome, Some(SyncOutcome::Accepted { .. })));
    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    // The first cookie-store match wins
    assert_eq!(requests[0].1, json!({"st": "tok_XYZ"}));
}

#[tokio::test]
async fn missing_cookie_never_reaches_the_backend() {
    let stub = StubBackend::new(StatusCode::OK, success_body());
    let base_url = spawn_backend(stub.clone()).await;
    let client = SyncClient::new(base_url, "test-key");

    let source = FixedCookies(vec![]);
    let outcome = sync_from_cookies(&source, &client).await;

    assert!(outcome.is_none());
    assert_eq!(stub.request_count(), 0);
}
