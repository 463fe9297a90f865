mod common;

use crate::common::*;
use pranayam_chat_lib::libs::api::api_traits::{ApiError, ChatApi, DatingApi};
use pranayam_chat_lib::libs::api::http_client::HttpApiClient;
use pranayam_chat_lib::libs::core::config::ClientConfig;
use pranayam_chat_lib::libs::session::session_manager::SessionManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    authorization: Option<String>,
    body: String,
}

/// Canned `(status, body)` per request path; anything else is a 404.
type Routes = HashMap<&'static str, (u16, &'static str)>;

struct StubServer {
    requests: Arc<Mutex<Vec<Recorded>>>,
    config: ClientConfig,
}

async fn stub_server(routes: Routes) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let recorded = recorded.clone();
            let routes = routes.clone();
            tokio::spawn(async move { answer(stream, &routes, &recorded).await });
        }
    });

    StubServer {
        requests,
        config: ClientConfig {
            api_base_url: format!("http://127.0.0.1:{}/api/", port),
            ..ClientConfig::default()
        },
    }
}

async fn answer(mut stream: TcpStream, routes: &Routes, recorded: &Mutex<Vec<Recorded>>) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        raw.extend_from_slice(&chunk[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_string();
    let target = request_line.next().unwrap().to_string();

    let mut headers = HashMap::new();
    for line in lines.filter(|l| !l.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    while raw.len() < header_end + length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&raw[header_end..]).to_string();

    let path = target.split('?').next().unwrap_or_default().to_string();
    recorded.lock().unwrap().push(Recorded {
        method,
        target,
        authorization: headers.get("authorization").cloned(),
        body,
    });

    let (status, payload) = routes.get(path.as_str()).copied().unwrap_or((404, ""));
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn logged_in_client(config: &ClientConfig) -> (TempDir, HttpApiClient) {
    let (dir, store) = temp_store();
    let session = SessionManager::new(store);
    session.save_auth_token("token-abc").unwrap();
    let client = HttpApiClient::new(config, session).expect("Client should build");
    (dir, client)
}

#[tokio::test]
async fn test_bearer_token_is_sent_except_on_otp_routes() {
    let server = stub_server(HashMap::from([
        ("/api/conversations", (200, "[]")),
        ("/api/auth/send-otp", (200, r#"{"type":"success","message":"OTP sent"}"#)),
        (
            "/api/auth/verify-otp",
            (200, r#"{"access_token":"t","user":{"id":"u1","name":"Asha","phoneNumber":"+91"}}"#),
        ),
    ]))
    .await;
    let (_dir, client) = logged_in_client(&server.config);

    assert!(client.conversations().await.unwrap().is_empty());
    assert_eq!(client.send_otp("+919876543210").await.unwrap().kind, "success");
    assert_eq!(client.verify_otp("+919876543210", "123456").await.unwrap().user.id, "u1");

    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token-abc"));
    assert!(requests[1].authorization.is_none());
    assert!(requests[2].authorization.is_none());

    assert_eq!(requests[1].method, "POST");
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body, serde_json::json!({"phoneNumber": "+919876543210"}));
}

#[tokio::test]
async fn test_history_request_carries_the_page_query() {
    let server = stub_server(HashMap::from([(
        "/api/conversations/c1/messages",
        (200, r#"[{"id":"m1","text":"hi","timestamp":"2026-01-02T03:04:05Z","isSent":false}]"#),
    )]))
    .await;
    let (_dir, client) = logged_in_client(&server.config);

    let page = client.messages("c1", 20, Some(at(0))).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "m1");

    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests[0].method, "GET");
    assert!(requests[0].target.contains("limit=20"));
    assert!(requests[0].target.contains("before=2023-11-14T22%3A13%3A20.000Z"));
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let server = stub_server(HashMap::from([("/api/conversations", (503, r#"{"error":"busy"}"#))])).await;
    let (_dir, client) = logged_in_client(&server.config);

    let unavailable = client.conversations().await.unwrap_err();
    assert_eq!(unavailable, ApiError::Status(503));
    assert!(unavailable.is_retryable());

    let missing = client.messages("nowhere", 20, None).await.unwrap_err();
    assert_eq!(missing, ApiError::Status(404));
    assert!(!missing.is_retryable());
}

#[tokio::test]
async fn test_empty_or_garbled_bodies_are_malformed() {
    let server = stub_server(HashMap::from([
        ("/api/conversations", (200, "")),
        ("/api/conversations/c1/messages", (200, "<html>oops</html>")),
    ]))
    .await;
    let (_dir, client) = logged_in_client(&server.config);

    assert!(matches!(
        client.conversations().await,
        Err(ApiError::MalformedBody(_))
    ));
    assert!(matches!(
        client.messages("c1", 20, None).await,
        Err(ApiError::MalformedBody(_))
    ));
}

#[tokio::test]
async fn test_refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ClientConfig {
        api_base_url: format!("http://127.0.0.1:{}/api/", port),
        ..ClientConfig::default()
    };
    let (_dir, client) = logged_in_client(&config);

    let err = client.conversations().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_retryable());
}
