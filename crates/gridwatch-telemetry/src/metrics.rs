//! Prometheus metrics for gridwatch.
//!
//! Covers:
//! - Endpoint connectivity and reconnects
//! - Frame ingestion and drops
//! - Parsed events and parse failures
//! - Notifications sent, failed, and suppressed by cooldown
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntCounter, TextEncoder,
};

/// Endpoint connection state (1 = connected, 0 = disconnected).
pub static ENDPOINT_CONNECTED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gridwatch_endpoint_connected",
        "Endpoint connection state (1=connected)",
        &["label"]
    )
    .unwrap()
});

/// Total reconnection attempts per endpoint.
pub static RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_reconnect_total",
        "Total reconnection attempts",
        &["label"]
    )
    .unwrap()
});

/// Text frames received.
pub static FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_frames_total",
        "Total text frames received",
        &["label"]
    )
    .unwrap()
});

/// Frames dropped before dispatch.
/// Labels: reason (undecodable/not_actionable/binary)
pub static FRAMES_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_frames_dropped_total",
        "Total frames dropped before dispatch",
        &["label", "reason"]
    )
    .unwrap()
});

/// Events dispatched, by parsed kind.
pub static EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_events_total",
        "Total events dispatched",
        &["label", "kind"]
    )
    .unwrap()
});

/// Events discarded at the dispatch boundary.
pub static PARSE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_parse_errors_total",
        "Total events discarded due to parse or protocol errors",
        &["label", "kind"]
    )
    .unwrap()
});

/// Notifications delivered.
/// Labels: kind (startup/initial_summary/error_alert/digest)
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_notifications_total",
        "Total notifications delivered",
        &["kind"]
    )
    .unwrap()
});

pub static NOTIFICATIONS_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_notifications_failed_total",
        "Total notifications that failed to deliver",
        &["kind"]
    )
    .unwrap()
});

/// Notification delivery latency in milliseconds.
pub static NOTIFICATION_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gridwatch_notification_latency_ms",
        "Notification delivery latency in milliseconds",
        &["kind"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Error alerts suppressed by the cooldown window.
pub static ERROR_ALERTS_SUPPRESSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridwatch_error_alerts_suppressed_total",
        "Total error alerts suppressed by cooldown",
        &["label"]
    )
    .unwrap()
});

/// Periodic digests produced.
pub static DIGEST_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("gridwatch_digest_total", "Total periodic digests produced").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn endpoint_connected(label: &str) {
        ENDPOINT_CONNECTED.with_label_values(&[label]).set(1.0);
    }

    pub fn endpoint_disconnected(label: &str) {
        ENDPOINT_CONNECTED.with_label_values(&[label]).set(0.0);
    }

    /// Record a scheduled reconnection attempt.
    pub fn reconnect(label: &str) {
        RECONNECT_TOTAL.with_label_values(&[label]).inc();
    }

    pub fn frame_received(label: &str) {
        FRAMES_TOTAL.with_label_values(&[label]).inc();
    }

    pub fn frame_dropped(label: &str, reason: &str) {
        FRAMES_DROPPED_TOTAL
            .with_label_values(&[label, reason])
            .inc();
    }

    pub fn event_dispatched(label: &str, kind: &str) {
        EVENTS_TOTAL.with_label_values(&[label, kind]).inc();
    }

    pub fn parse_error(label: &str, kind: &str) {
        PARSE_ERRORS_TOTAL.with_label_values(&[label, kind]).inc();
    }

    /// Record the outcome of one notification.
    pub fn notification(kind: &str, delivered: bool, latency_ms: f64) {
        if delivered {
            NOTIFICATIONS_TOTAL.with_label_values(&[kind]).inc();
        } else {
            NOTIFICATIONS_FAILED_TOTAL.with_label_values(&[kind]).inc();
        }
        NOTIFICATION_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }

    pub fn error_alert_suppressed(label: &str) {
        ERROR_ALERTS_SUPPRESSED_TOTAL
            .with_label_values(&[label])
            .inc();
    }

    pub fn digest() {
        DIGEST_TOTAL.inc();
    }

    /// Render the default registry in the text exposition format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
