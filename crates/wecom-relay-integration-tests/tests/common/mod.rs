//! Common test utilities for wecom-relay integration tests
//!
//! This module provides:
//! - Mock and Telegram-backed implementations of `MessageSink`
//! - Builders for encrypted WeCom callbacks
//! - Request helpers driving the router in-process

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::Response,
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telegram_bot_client::{ClientConfig, TelegramClient};
use tokio::sync::Notify;
use tower::ServiceExt;
use wecom_relay_api::{create_router, AppState, RelayMetrics, ServiceConfig};
use wecom_relay_core::{CallbackCrypto, ChatMessage, DeliveryError, MessageSink};

pub const TOKEN: &str = "T";
pub const ZERO_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const OTHER_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFE";
pub const CORP_ID: &str = "ww-integration-corp";
pub const TIMESTAMP: &str = "1";
pub const NONCE: &str = "n";

// ============================================================================
// Mock sinks
// ============================================================================

/// Sink recording every message it is handed.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<ChatMessage>>>,
    failure: Arc<Mutex<Option<DeliveryError>>>,
    notify: Arc<Notify>,
}

impl RecordingSink {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later delivery fail with `error`.
    #[allow(dead_code)]
    pub fn fail_with(&self, error: DeliveryError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    #[allow(dead_code)]
    pub fn delivered(&self) -> Vec<ChatMessage> {
        self.delivered.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages were handed to the sink.
    #[allow(dead_code)]
    pub async fn wait_for(&self, count: usize) -> Vec<ChatMessage> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                let delivered = self.delivered();
                if delivered.len() >= count {
                    return delivered;
                }
                notified.await;
            }
        })
        .await
        .expect("sink should receive the expected deliveries")
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(message.clone());
        self.notify.notify_waiters();

        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Sink posting to a Telegram Bot API, used against a mock server.
#[allow(dead_code)]
pub struct TelegramChatSink {
    client: TelegramClient,
    chat_id: String,
}

impl TelegramChatSink {
    #[allow(dead_code)]
    pub fn new(api_base_url: &str, bot_token: &str, chat_id: &str) -> Self {
        let config = ClientConfig::builder()
            .api_base_url(api_base_url)
            .timeout(Duration::from_secs(2))
            .build();
        let client = TelegramClient::builder(bot_token)
            .config(config)
            .build()
            .unwrap();

        Self {
            client,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl MessageSink for TelegramChatSink {
    async fn deliver(&self, message: &ChatMessage) -> Result<(), DeliveryError> {
        self.client
            .send_message(&self.chat_id, &message.notification_text())
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::Unavailable {
                message: e.to_string(),
            })
    }
}

// ============================================================================
// Application fixtures
// ============================================================================

/// Router plus the handles tests inspect
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub crypto: Arc<CallbackCrypto>,
    pub metrics: Arc<RelayMetrics>,
}

#[allow(dead_code)]
pub fn test_crypto() -> Arc<CallbackCrypto> {
    Arc::new(CallbackCrypto::new(TOKEN, ZERO_KEY, CORP_ID).unwrap())
}

#[allow(dead_code)]
pub fn create_test_app(sink: Arc<dyn MessageSink>) -> TestApp {
    create_test_app_with_config(ServiceConfig::default(), sink)
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: ServiceConfig, sink: Arc<dyn MessageSink>) -> TestApp {
    let crypto = test_crypto();
    let metrics = RelayMetrics::new().unwrap();
    let state = AppState::new(config, crypto.clone(), sink, metrics.clone());

    TestApp {
        router: create_router(state),
        crypto,
        metrics,
    }
}

// ============================================================================
// Callback builders
// ============================================================================

/// Percent-encode the characters base64 output may contain.
#[allow(dead_code)]
pub fn percent_encode(value: &str) -> String {
    value
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

#[allow(dead_code)]
pub fn verify_uri(path: &str, signature: &str, echostr: &str) -> String {
    format!(
        "{}?msg_signature={}&timestamp={}&nonce={}&echostr={}",
        path,
        signature,
        TIMESTAMP,
        NONCE,
        percent_encode(echostr)
    )
}

#[allow(dead_code)]
pub fn callback_uri(path: &str, signature: &str) -> String {
    format!(
        "{}?msg_signature={}&timestamp={}&nonce={}",
        path, signature, TIMESTAMP, NONCE
    )
}

/// Inbound text message as WeCom sends it before encryption
#[allow(dead_code)]
pub fn text_message_xml(sender: &str, content: &str) -> String {
    format!(
        "<xml><ToUserName><![CDATA[{}]]></ToUserName>\
         <FromUserName><![CDATA[{}]]></FromUserName>\
         <CreateTime>1700000000</CreateTime>\
         <MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[{}]]></Content>\
         <MsgId>7000000000000000001</MsgId>\
         <AgentID>1000002</AgentID></xml>",
        CORP_ID, sender, content
    )
}

/// Inbound event notification as WeCom sends it before encryption
#[allow(dead_code)]
pub fn event_xml(sender: &str) -> String {
    format!(
        "<xml><ToUserName><![CDATA[{}]]></ToUserName>\
         <FromUserName><![CDATA[{}]]></FromUserName>\
         <CreateTime>1700000000</CreateTime>\
         <MsgType><![CDATA[event]]></MsgType>\
         <Event><![CDATA[enter_agent]]></Event>\
         <AgentID>1000002</AgentID></xml>",
        CORP_ID, sender
    )
}

/// Outer POST body wrapping `ciphertext`
#[allow(dead_code)]
pub fn envelope_xml(ciphertext: &str) -> String {
    format!(
        "<xml><ToUserName><![CDATA[{}]]></ToUserName>\
         <Encrypt><![CDATA[{}]]></Encrypt>\
         <AgentID><![CDATA[1000002]]></AgentID></xml>",
        CORP_ID, ciphertext
    )
}

/// Encrypt and sign `payload`, returning `(signature, outer body)`.
#[allow(dead_code)]
pub fn signed_callback(crypto: &CallbackCrypto, payload: &str) -> (String, String) {
    let ciphertext = crypto.seal(payload).unwrap();
    let signature = crypto.sign(TIMESTAMP, NONCE, &ciphertext);
    (signature, envelope_xml(&ciphertext))
}

// ============================================================================
// Request helpers
// ============================================================================

#[allow(dead_code)]
pub async fn send_get(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn send_post(router: &Router, uri: &str, body: impl Into<Body>) -> Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "text/xml")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll `/metrics` until it contains `needle`.
#[allow(dead_code)]
pub async fn wait_for_metric(router: &Router, needle: &str) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let text = body_text(send_get(router, "/metrics").await).await;
            if text.contains(needle) {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("metric should be recorded")
}
