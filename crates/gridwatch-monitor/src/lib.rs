//! Trading-bot monitor.
//!
//! Watches a set of grid-trading bots over their WebSocket streams and
//! keeps an in-memory snapshot of each one:
//! - One reconnecting client per bot endpoint
//! - Event dispatch into per-bot state
//! - Rate-limited error alerts and a periodic digest
//! - Snapshot queries for on-demand status

pub mod config;
pub mod cooldown;
pub mod error;
pub mod monitor;

pub use config::AppConfig;
pub use cooldown::ErrorCooldown;
pub use error::{AppError, AppResult};
pub use monitor::{Monitor, MonitorSettings};
