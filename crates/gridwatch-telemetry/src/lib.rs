//! Prometheus metrics and structured logging for gridwatch.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus metrics for endpoint connectivity, ingestion and notifications

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{default_filter, init_logging};
pub use metrics::Metrics;
