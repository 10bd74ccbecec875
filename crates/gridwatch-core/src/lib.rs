//! Core domain types for the gridwatch monitor.
//!
//! This crate provides the types shared by every other crate:
//! - `Endpoint`: one monitored bot (label + stream address)
//! - `SystemInfo`, `StrategyConfig`: identity and strategy parameters
//! - `Summary`: closed sum of spot-grid and perp-grid summaries
//! - `Baseline`, `Delta`: counters used by the periodic digest

pub mod decimal;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod summary;

pub use decimal::decimal_from_json;
pub use endpoint::Endpoint;
pub use error::{CoreError, Result};
pub use models::{StrategyConfig, SystemInfo};
pub use summary::{
    Baseline, Delta, PerpGridSummary, SpacingRange, SpotGridSummary, Summary, SummaryKind,
};
