//! Metrics collection and observability types for the relay.
//!
//! Each [`RelayMetrics`] owns its registry, so independent instances (one per
//! test router, for example) never collide on metric names.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "wecom_relay";

/// Which callback flow a request exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// `GET` echo-challenge handshake
    VerifyUrl,
    /// `POST` message delivery
    Message,
}

impl CallbackFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyUrl => "verify_url",
            Self::Message => "message",
        }
    }
}

/// Relay metrics for observability
#[derive(Debug)]
pub struct RelayMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    // Callback processing metrics
    pub callbacks_total: IntCounterVec,
    pub callback_duration_seconds: HistogramVec,

    // Downstream delivery metrics
    pub deliveries_total: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0]),
            &["method", "path"],
        )?;
        let callbacks_total = IntCounterVec::new(
            Opts::new(
                "callbacks_total",
                "Callbacks processed, by flow and outcome",
            ),
            &["flow", "outcome"],
        )?;
        let callback_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "callback_duration_seconds",
                "Time to authenticate, decrypt and parse a callback",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
            &["flow"],
        )?;
        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Downstream deliveries, by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(callbacks_total.clone()))?;
        registry.register(Box::new(callback_duration_seconds.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            callbacks_total,
            callback_duration_seconds,
            deliveries_total,
        }))
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    /// Record one callback. `outcome` is `ok`, `ignored`, or an error kind.
    pub fn record_callback(&self, flow: CallbackFlow, outcome: &str, duration: Duration) {
        self.callbacks_total
            .with_label_values(&[flow.as_str(), outcome])
            .inc();
        self.callback_duration_seconds
            .with_label_values(&[flow.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record one delivery attempt. `outcome` is `delivered` or an error kind.
    pub fn record_delivery(&self, outcome: &str) {
        self.deliveries_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
