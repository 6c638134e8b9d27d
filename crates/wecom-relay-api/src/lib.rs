//! # WeCom Relay HTTP Service
//!
//! HTTP server receiving WeCom callbacks and relaying verified chat messages
//! to a downstream [`MessageSink`].
//!
//! This service provides:
//! - The callback endpoint: `GET` for URL verification, `POST` for messages
//! - A liveness endpoint at `/health`
//! - Prometheus metrics at `/metrics`

pub mod config;
pub mod errors;
pub mod metrics;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig, TelegramConfig, WecomConfig};
pub use errors::{CallbackHandlerError, ConfigError, ServiceError};
pub use metrics::{CallbackFlow, RelayMetrics};

use axum::{
    extract::{rejection::QueryRejection, DefaultBodyLimit, MatchedPath, Query, State},
    http::StatusCode,
    middleware,
    response::{Json, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{future::IntoFuture, sync::Arc, time::Instant};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument, warn, Instrument};
use wecom_relay_core::{CallbackCrypto, CallbackParams, ChatMessage, MessageSink};

/// Body WeCom expects from the message endpoint.
pub const SUCCESS_BODY: &str = "success";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Secrets of the WeCom integration
    pub crypto: Arc<CallbackCrypto>,

    /// Destination for verified messages
    pub sink: Arc<dyn MessageSink>,

    /// Metrics collector for observability
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        crypto: Arc<CallbackCrypto>,
        sink: Arc<dyn MessageSink>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            config,
            crypto,
            sink,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
///
/// # Panics
///
/// Panics if `config.wecom.endpoint_path` is not a valid route or collides
/// with `/health` or `/metrics`. [`ServiceConfig::validate`] rejects both.
pub fn create_router(state: AppState) -> Router {
    let callback_routes = Router::new().route(
        &state.config.wecom.endpoint_path,
        get(handle_verify_url).post(handle_callback_message),
    );

    let observability_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    let router = Router::new()
        .merge(callback_routes)
        .merge(observability_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(state.config.server.request_timeout()))
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        );

    let router = if state.config.server.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM, then drains in-flight requests for at most
/// `server.shutdown_timeout_seconds`.
///
/// # Errors
///
/// Returns [`ServiceError::Configuration`] if `config` fails validation,
/// before anything is bound.
pub async fn start_server(
    config: ServiceConfig,
    crypto: Arc<CallbackCrypto>,
    sink: Arc<dyn MessageSink>,
) -> Result<(), ServiceError> {
    config.validate()?;

    let metrics = RelayMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let state = AppState::new(config.clone(), crypto, sink, metrics);
    let app = create_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let shutdown_timeout = config.server.shutdown_timeout();
    let shutdown_started = Arc::new(tokio::sync::Notify::new());

    let signal_notify = shutdown_started.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Initiating graceful shutdown"
        );
        signal_notify.notify_one();
    });

    // Graceful shutdown lets in-flight requests finish; the deadline bounds
    // how long that may take.
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!("Graceful shutdown timed out; abandoning in-flight requests");
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Callback Handlers
// ============================================================================

/// Query parameters of a URL verification request
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyUrlQuery {
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: String,
}

/// Query parameters of a message delivery request
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
}

/// Handle the URL verification handshake
///
/// Returns the decrypted challenge as `text/plain`. Any failure maps to a
/// generic `403` or `400` via [`CallbackHandlerError`].
#[instrument(skip_all)]
pub async fn handle_verify_url(
    State(state): State<AppState>,
    query: Result<Query<VerifyUrlQuery>, QueryRejection>,
) -> Result<String, CallbackHandlerError> {
    let Query(query) = query?;
    let params = CallbackParams::new(query.msg_signature, query.timestamp, query.nonce);

    let start = Instant::now();
    let result = state.crypto.verify_url(&params, &query.echostr);
    let elapsed = start.elapsed();

    match result {
        Ok(challenge) => {
            state
                .metrics
                .record_callback(CallbackFlow::VerifyUrl, "ok", elapsed);
            info!("URL verification succeeded");
            Ok(challenge)
        }
        Err(e) => {
            state
                .metrics
                .record_callback(CallbackFlow::VerifyUrl, e.kind(), elapsed);
            Err(CallbackHandlerError::Rejected(e))
        }
    }
}

/// Handle a message delivery callback
///
/// Implements the immediate response pattern: once the query parameters are
/// present the response is always `200 success`, whatever happens to the
/// message. Verified text messages are relayed in a spawned task so the
/// acknowledgement never waits on the downstream API.
#[instrument(skip_all)]
pub async fn handle_callback_message(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    body: Bytes,
) -> Result<&'static str, CallbackHandlerError> {
    let Query(query) = query?;
    let params = CallbackParams::new(query.msg_signature, query.timestamp, query.nonce);

    let Ok(xml) = std::str::from_utf8(&body) else {
        state.metrics.record_callback(
            CallbackFlow::Message,
            "malformed_payload",
            std::time::Duration::ZERO,
        );
        info!(body_len = body.len(), "Callback body is not valid UTF-8; ignoring");
        return Ok(SUCCESS_BODY);
    };

    let start = Instant::now();
    let result = state.crypto.receive(&params, xml);
    let elapsed = start.elapsed();

    match result {
        Ok(Some(message)) => {
            state
                .metrics
                .record_callback(CallbackFlow::Message, "ok", elapsed);
            debug!(
                sender = %message.sender,
                content = %message.content,
                "Callback message decrypted"
            );
            spawn_delivery(&state, message);
        }
        Ok(None) => {
            state
                .metrics
                .record_callback(CallbackFlow::Message, "ignored", elapsed);
            debug!("Callback carried no text message; nothing to relay");
        }
        Err(e) => {
            state
                .metrics
                .record_callback(CallbackFlow::Message, e.kind(), elapsed);
            if e.is_security_relevant() {
                warn!(error = %e, kind = e.kind(), "Callback message rejected");
            } else {
                info!(error = %e, kind = e.kind(), "Callback message rejected");
            }
        }
    }

    Ok(SUCCESS_BODY)
}

/// Relay a message to the sink in the background
fn spawn_delivery(state: &AppState, message: ChatMessage) {
    let sink = state.sink.clone();
    let metrics = state.metrics.clone();

    tokio::spawn(
        async move {
            match sink.deliver(&message).await {
                Ok(()) => {
                    metrics.record_delivery("delivered");
                    info!(sender = %message.sender, "Message relayed");
                }
                Err(e) => {
                    metrics.record_delivery(e.kind());
                    error!(
                        error = %e,
                        transient = e.is_transient(),
                        sender = %message.sender,
                        "Failed to relay message"
                    );
                }
            }
        }
        .instrument(tracing::info_span!("relay_delivery")),
    );
}

// ============================================================================
// Health and Observability Handlers
// ============================================================================

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Basic health check endpoint
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// This middleware:
/// - Extracts or generates correlation IDs for request tracking
/// - Logs request start and completion with structured fields
/// - Propagates correlation ID through response headers
///
/// Only the path is logged; query strings carry signatures and ciphertext.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Extract or generate correlation ID
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    // Add correlation ID to request extensions for downstream handlers
    request.extensions_mut().insert(correlation_id.clone());

    debug!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    // Log at appropriate level based on status code
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Metrics collection middleware
///
/// Labels requests by their matched route so unknown paths cannot inflate
/// metric cardinality.
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    state.metrics.record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
