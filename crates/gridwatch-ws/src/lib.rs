//! WebSocket client for monitored bot endpoints.
//!
//! Provides one resilient connection per endpoint with:
//! - Automatic reconnection with capped exponential backoff
//! - Keepalive probing (ping on idle, pong deadline)
//! - Frame decoding into `(kind, payload)` pairs
//! - Channel-based delivery of connect/disconnect/frame events

pub mod backoff;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;

pub use backoff::{backoff_delay, Backoff};
pub use connection::{ConnectionConfig, ConnectionState, EndpointClient};
pub use error::{WsError, WsResult};
pub use heartbeat::Keepalive;
pub use message::{EndpointEvent, Frame};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
