//! Event parsing and per-bot state for gridwatch.
//!
//! Turns `(kind, payload)` pairs from endpoint clients into typed
//! `BotEvent`s and keeps one `BotState` per configured endpoint behind
//! its own lock.

pub mod bot_state;
pub mod error;
pub mod parser;

pub use bot_state::{BotSnapshot, BotState, BotStates, SnapshotSource};
pub use error::{FeedError, FeedResult};
pub use parser::{BotEvent, EventKind, EventParser};
