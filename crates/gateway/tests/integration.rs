#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests driving a real `tokio-tungstenite` client against an
//! in-process gateway, covering the testable properties that genuinely need
//! wire bytes: response correlation (2), queue backpressure (3), and
//! large-message offload (9). Grounded on the teacher's `tests/chat_ui.rs`
//! (`start_test_server` on an ephemeral port, `reqwest`/`connect_async`
//! against it).

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use qws_gateway::build_state;
use qws_gateway::config::GatewayConfig;
use qws_gateway::routes::build_app;

fn test_config() -> GatewayConfig {
    GatewayConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        liveness_timeout_secs: 10,
        log_level: "info".to_string(),
        json_logs: false,
    }
}

/// Spin up a gateway on an ephemeral port, return its bound address.
async fn start_test_server() -> SocketAddr {
    let state = build_state(test_config()).await.expect("build_state failed");
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

async fn recv_json(ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin)) -> Value {
    loop {
        match ws.next().await.expect("stream ended").expect("read error") {
            Message::Text(text) => return serde_json::from_str(&text).expect("non-JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn health_endpoint_reports_connection_count() {
    let addr = start_test_server().await;
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn ws_handshake_assigns_a_session_id() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("ws connect failed");

    let first = recv_json(&mut ws).await;
    assert_eq!(first["cmd"], 0); // out_cmd::SESSION_ID
    assert!(first["data"]["s_id"].is_i64());
}

/// Testable property 1/2: a request the registered handler never answers
/// gets a synthesised empty correlated response carrying the same id. The
/// chat handler (`in_cmd::CHAT_MESSAGE`) is a `PlainHandler` that never
/// clears the message id, so any id-bearing chat frame exercises exactly
/// this path.
#[tokio::test]
async fn unanswered_request_gets_synthesised_empty_response() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("ws connect failed");
    let _session_id_frame = recv_json(&mut ws).await;

    ws.send(Message::Text(json!({"cmd": 1, "id": 9, "data": {"text": "hello"}}).to_string().into()))
        .await
        .unwrap();

    // Chat is broadcast back to the sender too; skip that push and find the
    // synthesised correlated response.
    loop {
        let frame = recv_json(&mut ws).await;
        if frame.get("id") == Some(&json!(9)) {
            assert!(frame.get("data").is_none() || frame["data"].is_null());
            break;
        }
    }
}

/// Testable property 9: an outbound body over the offload threshold is
/// replaced by `{"httpid": "..."}`; the bytes are retrievable exactly once
/// over HTTP.
#[tokio::test]
async fn oversized_chat_broadcast_is_offloaded_and_fetched_once() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("ws connect failed");
    let _session_id_frame = recv_json(&mut ws).await;

    let huge_text = "x".repeat(150_000);
    ws.send(Message::Text(json!({"cmd": 1, "data": {"text": huge_text}}).to_string().into()))
        .await
        .unwrap();

    let frame = recv_json(&mut ws).await;
    let httpid = frame["httpid"].as_str().expect("expected an offload pointer frame");

    let resp = reqwest::get(format!("http://{addr}/offload/{httpid}")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("\"cmd\":1"));

    let second = reqwest::get(format!("http://{addr}/offload/{httpid}")).await.unwrap();
    assert_eq!(second.status(), 404);
}

/// Testable property 3: filling one connection's outbound queue (because its
/// reader stopped pulling frames) closes that connection without affecting
/// others.
#[tokio::test]
async fn slow_reader_is_disconnected_without_affecting_others() {
    let addr = start_test_server().await;
    const BROADCASTS: usize = 80;

    let (mut slow, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect failed");
    let (fast, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect failed");
    let (sender, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect failed");
    let _ = recv_json(&mut slow).await;

    // `fast` and `sender` both keep draining their own inbound stream (each
    // also receives every broadcast, including its own); only `slow` never
    // reads another frame after its handshake, so its bounded outbound queue
    // (capacity 50) is the one that backs up.
    let (mut sender_write, mut sender_read) = sender.split();
    let (_fast_write, mut fast_read) = fast.split();
    let _ = recv_json(&mut sender_read).await;
    let _ = recv_json(&mut fast_read).await;

    let fast_drainer = tokio::spawn(async move {
        let mut seen = 0usize;
        while seen < BROADCASTS {
            match tokio::time::timeout(Duration::from_secs(5), fast_read.next()).await {
                Ok(Some(Ok(Message::Text(_)))) => seen += 1,
                Ok(Some(Ok(_))) => continue,
                _ => break,
            }
        }
        seen
    });
    let sender_drainer = tokio::spawn(async move {
        let mut seen = 0usize;
        while seen < BROADCASTS {
            match tokio::time::timeout(Duration::from_secs(5), sender_read.next()).await {
                Ok(Some(Ok(Message::Text(_)))) => seen += 1,
                Ok(Some(Ok(_))) => continue,
                _ => break,
            }
        }
        seen
    });

    let payload = "x".repeat(20_000);
    for i in 0..BROADCASTS {
        sender_write
            .send(Message::Text(json!({"cmd": 1, "data": {"text": format!("{i} {payload}")}}).to_string().into()))
            .await
            .unwrap();
    }

    let seen = fast_drainer.await.unwrap();
    assert_eq!(seen, BROADCASTS, "fast connection should have received every broadcast");
    let _ = sender_drainer.await.unwrap();

    // The slow connection's queue should have overflowed and closed it
    // server-side well before all 80 broadcasts were sent.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        tokio::time::timeout(Duration::from_secs(1), slow.next()).await,
        Ok(None) | Ok(Some(Err(_))) | Err(_)
    ));
}

#[tokio::test]
async fn who_command_lists_connected_names() {
    let addr = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect failed");
    let _ = recv_json(&mut ws).await;

    ws.send(Message::Text(json!({"cmd": 1, "data": {"text": "/who"}}).to_string().into()))
        .await
        .unwrap();

    let frame = recv_json(&mut ws).await;
    assert_eq!(frame["cmd"], 1);
    assert!(frame["data"]["message"].as_str().unwrap().contains("Guest"));
}
