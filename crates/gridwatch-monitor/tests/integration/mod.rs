//! Integration tests for the gridwatch monitor.
//!
//! These tests run real endpoint clients against a scripted local
//! WebSocket server:
//! - Frame delivery and malformed-frame resilience
//! - Reconnection after the server drops the connection
//! - End-to-end dispatch into state and notifications

pub mod common;
