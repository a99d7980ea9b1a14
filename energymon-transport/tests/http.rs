//! `HttpConnector` and `ResilientTransport` against a local HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use energymon_transport::{
    Connector, HttpConnector, RecordingDelay, ResilientTransport, RetryPolicy, Transport,
    TransportError,
};
use serde_json::{Value, json};

#[derive(Default)]
struct Hits {
    failing: AtomicUsize,
    rejected: AtomicUsize,
}

async fn readings(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let count = body["readings"].as_array().map_or(0, Vec::len);

    Json(json!({
        "status": "success",
        "message": "Readings received",
        "count": count,
        "auth": auth,
    }))
}

async fn failing(State(hits): State<Arc<Hits>>) -> (StatusCode, &'static str) {
    hits.failing.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "collector overloaded")
}

async fn rejected(State(hits): State<Arc<Hits>>) -> (StatusCode, &'static str) {
    hits.rejected.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_REQUEST, "malformed reading")
}

async fn not_json() -> &'static str {
    "hello"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!({"status": "late"}))
}

async fn health() -> &'static str {
    "ok"
}

/// Serve the test collector on an ephemeral port.
async fn start_collector() -> (SocketAddr, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route("/api/readings", post(readings))
        .route("/fail", post(failing))
        .route("/reject", post(rejected))
        .route("/text", post(not_json))
        .route("/slow", post(slow))
        .route("/health", get(health))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

/// An address nothing listens on.
async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn http_transport(
    addr: SocketAddr,
    timeout: Duration,
) -> ResilientTransport<HttpConnector, RecordingDelay> {
    let transport = ResilientTransport::http().with_delay(RecordingDelay::new());
    transport
        .initialize(&format!("http://{}", addr), timeout)
        .unwrap();
    transport
}

#[tokio::test]
async fn test_post_with_bearer_token() {
    let (addr, _) = start_collector().await;
    let transport = http_transport(addr, Duration::from_secs(5));
    transport.set_authentication(Some("api-key-123".into()));

    let response = transport
        .send_request(
            "/api/readings",
            &json!({"device": "ade7878a", "readings": [{"voltage": 230.0}, {"voltage": 231.0}]}),
        )
        .await
        .unwrap();

    assert_eq!(response["status"], "success");
    assert_eq!(response["count"], 2);
    assert_eq!(response["auth"], "Bearer api-key-123");
}

#[tokio::test]
async fn test_without_token_no_header() {
    let (addr, _) = start_collector().await;
    let transport = http_transport(addr, Duration::from_secs(5));

    let response = transport
        .send_request("/api/readings", &json!({"readings": []}))
        .await
        .unwrap();
    assert_eq!(response["auth"], Value::Null);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (addr, hits) = start_collector().await;
    let transport = http_transport(addr, Duration::from_secs(5));
    transport.set_retry_policy(RetryPolicy::new(2, Duration::from_millis(1), true));

    let err = transport.send_request("/fail", &json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::Status { code: 500, ref body } if body == "collector overloaded"
    ));
    assert_eq!(hits.failing.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_retried() {
    let (addr, hits) = start_collector().await;
    let transport = http_transport(addr, Duration::from_secs(5));
    transport.set_retry_policy(RetryPolicy::new(3, Duration::from_millis(1), true));

    let err = transport.send_request("/reject", &json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::Status { code: 400, ref body } if body == "malformed reading"
    ));
    assert_eq!(hits.rejected.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_non_json_body() {
    let (addr, _) = start_collector().await;
    let connector = HttpConnector::new(Duration::from_secs(5)).unwrap();

    let err = connector
        .post(
            &format!("http://{}/text", addr),
            &json!({}),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn test_timeout() {
    let (addr, _) = start_collector().await;
    let transport = http_transport(addr, Duration::from_millis(100));
    transport.set_retry_policy(RetryPolicy::none());

    let err = transport.send_request("/slow", &json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    let addr = closed_port().await;
    let delay = RecordingDelay::new();
    let transport = ResilientTransport::http().with_delay(delay.clone());
    transport
        .initialize(&format!("http://{}", addr), Duration::from_secs(1))
        .unwrap();
    transport.set_retry_policy(RetryPolicy::new(2, Duration::from_millis(5), false));

    let err = transport
        .send_request("/api/readings", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
    assert_eq!(delay.waits().len(), 2);
}

#[tokio::test]
async fn test_connection_probe() {
    let (addr, _) = start_collector().await;
    assert!(http_transport(addr, Duration::from_secs(1)).test_connection().await);

    let closed = closed_port().await;
    assert!(!http_transport(closed, Duration::from_secs(1)).test_connection().await);
}
