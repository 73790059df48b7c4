//! HTTP transport tests for basekit-server.
// crates/basekit-server/tests/http_transport.rs
// =============================================================================
// Module: HTTP Transport Tests
// Description: Live-socket calls through the axum router.
// Purpose: Ensure the wire envelope, status codes, and body limits hold.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only transport assertions."
)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use basekit_config::BaseKitConfig;
use basekit_config::ServerConfig;
use basekit_config::ServerTlsConfig;
use rcgen::CertificateParams;
use rcgen::KeyPair;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

use crate::common::harness;

async fn spawn(config: BaseKitConfig) -> SocketAddr {
    let harness = harness(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = harness.service;
    tokio::spawn(async move { service.serve_listener(listener).await });
    addr
}

async fn post(addr: SocketAddr, method: &str, body: impl Into<reqwest::Body>) -> (StatusCode, String, String) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/{method}"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (status, content_type, response.text().await.unwrap())
}

#[tokio::test]
async fn echo_round_trips_over_a_socket() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, content_type, text) = post(addr, "echo", r#"{"msg":"hi"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json");
    assert_eq!(text, r#"{"result":{"msg":"hi"},"status":{"error":"ok","errorMessage":""}}"#);
}

#[tokio::test]
async fn plain_listener_is_not_ssl() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, _, text) = post(addr, "secureEcho", r#"{"msg":"hi"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["status"]["error"], json!("ssl_required"));
}

#[tokio::test]
async fn unknown_method_is_404_with_envelope() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, _, text) = post(addr, "missing", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["result"], json!({}));
    assert_eq!(response["status"]["error"], json!("not_found"));
}

#[tokio::test]
async fn malformed_json_is_invalid_parameter() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, _, text) = post(addr, "echo", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["status"]["error"], json!("invalid_parameter"));
}

#[tokio::test]
async fn empty_body_is_an_empty_request() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, _, text) = post(addr, "echo", "").await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["status"]["errorMessage"], json!("Request is empty."));
}

#[tokio::test]
async fn oversized_body_is_413_with_envelope() {
    let config = BaseKitConfig {
        server: ServerConfig {
            max_body_bytes: 64,
            ..ServerConfig::default()
        },
        ..BaseKitConfig::default()
    };
    let addr = spawn(config).await;
    let body = json!({"msg": "x".repeat(200)}).to_string();
    let (status, _, text) = post(addr, "echo", body).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["status"]["error"], json!("invalid_parameter"));
}

#[tokio::test]
async fn get_api_is_served_over_http() {
    let addr = spawn(BaseKitConfig::default()).await;
    let (status, _, text) = post(addr, "getAPI", "{}").await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(response["status"]["error"], json!("ok"));
    assert!(response["result"]["methods"]["echo"].is_object());
}

#[tokio::test]
async fn stalled_body_times_out_with_408() {
    let config = BaseKitConfig {
        server: ServerConfig {
            idle_timeout_ms: 200,
            ..ServerConfig::default()
        },
        ..BaseKitConfig::default()
    };
    let addr = spawn(config).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "POST /echo HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{{\"msg\""
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    let mut received = Vec::new();
    let mut chunk = [0_u8; 512];
    while !received.windows(2).any(|pair| pair == b"\r\n") {
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk)).await.unwrap().unwrap();
        assert!(read > 0, "connection closed before a status line");
        received.extend_from_slice(&chunk[..read]);
    }
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 408"), "{text}");
}

fn unused_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn https_listener_starts_alongside_plain_http() {
    let dir = tempfile::tempdir().unwrap();
    let key = KeyPair::generate().unwrap();
    let cert = CertificateParams::new(vec!["localhost".to_string()]).unwrap().self_signed(&key).unwrap();
    let cert_path = dir.path().join("server.pem");
    let key_path = dir.path().join("server.key");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key.serialize_pem()).unwrap();
    let bind = unused_port();
    let https = unused_port();
    let config = BaseKitConfig {
        server: ServerConfig {
            bind: bind.to_string(),
            https_bind: Some(https.to_string()),
            tls: Some(ServerTlsConfig {
                cert_path: cert_path.display().to_string(),
                key_path: key_path.display().to_string(),
            }),
            abort_on_panic: false,
            ..ServerConfig::default()
        },
        ..BaseKitConfig::default()
    };
    let service = harness(config).service;
    let handle = tokio::spawn(service.serve());
    let mut connected = false;
    for _ in 0..50 {
        if TcpStream::connect(https).await.is_ok() {
            connected = true;
            break;
        }
        assert!(!handle.is_finished(), "server exited during TLS setup");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(connected, "https listener never accepted");
    let (status, _, _) = post(bind, "getAPI", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!handle.is_finished());
    handle.abort();
}
