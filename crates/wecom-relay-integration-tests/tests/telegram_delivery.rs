//! Integration tests running callbacks through to a mock Telegram Bot API

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wecom_relay_api::SUCCESS_BODY;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const BOT_TOKEN: &str = "123:integration";
const SEND_PATH: &str = "/bot123:integration/sendMessage";
const CHAT_ID: &str = "-1001234";

fn sent_message() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {
            "message_id": 77,
            "date": 1700000000,
            "chat": { "id": -1001234, "type": "supergroup" },
            "text": "ignored"
        }
    }))
}

/// Wait until the mock server has seen `count` requests.
async fn received(server: &MockServer, count: usize) -> Vec<Request> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let requests = server.received_requests().await.unwrap_or_default();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Telegram should be called")
}

/// Verify the whole path from encrypted callback to Bot API request
#[tokio::test]
async fn test_text_message_reaches_telegram() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_json(json!({
            "chat_id": CHAT_ID,
            "text": "From WeCom (alice):\nhello from wecom"
        })))
        .respond_with(sent_message())
        .expect(1)
        .mount(&server)
        .await;

    let sink = TelegramChatSink::new(&server.uri(), BOT_TOKEN, CHAT_ID);
    let app = create_test_app(Arc::new(sink));
    let (signature, body) =
        signed_callback(&app.crypto, &text_message_xml("alice", "hello from wecom"));

    // Act
    let response = send_post(&app.router, &callback_uri("/wecom", &signature), body).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, SUCCESS_BODY);
    received(&server, 1).await;
    wait_for_metric(
        &app.router,
        "wecom_relay_deliveries_total{outcome=\"delivered\"} 1",
    )
    .await;
}

/// Verify that a Bot API outage does not affect the acknowledgement
#[tokio::test]
async fn test_telegram_outage_is_absorbed() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let sink = TelegramChatSink::new(&server.uri(), BOT_TOKEN, CHAT_ID);
    let app = create_test_app(Arc::new(sink));
    let (signature, body) = signed_callback(&app.crypto, &text_message_xml("alice", "hello"));

    // Act
    let response = send_post(&app.router, &callback_uri("/wecom", &signature), body).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, SUCCESS_BODY);
    received(&server, 1).await;
    wait_for_metric(
        &app.router,
        "wecom_relay_deliveries_total{outcome=\"unavailable\"} 1",
    )
    .await;
}

/// Verify that unauthenticated callbacks never reach Telegram
#[tokio::test]
async fn test_forged_callback_never_reaches_telegram() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sent_message())
        .expect(0)
        .mount(&server)
        .await;

    let sink = TelegramChatSink::new(&server.uri(), BOT_TOKEN, CHAT_ID);
    let app = create_test_app(Arc::new(sink));
    let ciphertext = app
        .crypto
        .seal(&text_message_xml("mallory", "hello"))
        .unwrap();
    let body = envelope_xml(&ciphertext);

    // Act
    let response = send_post(
        &app.router,
        &callback_uri("/wecom", "0000000000000000000000000000000000000000"),
        body,
    )
    .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}
