//! Per-bot state cache.
//!
//! One `BotState` per configured endpoint, each behind its own
//! `RwLock` so a slow reader of one bot never stalls ingestion for another.
//! Entries are created once from the endpoint list; events for unknown
//! labels never create new entries.

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gridwatch_core::{Baseline, Delta, Endpoint, StrategyConfig, Summary, SystemInfo};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Mutable state of one monitored bot.
#[derive(Debug, Clone)]
pub struct BotState {
    pub label: String,
    pub address: String,

    // Connection status
    pub connected: bool,
    pub last_connected_at: Option<DateTime<Utc>>,

    // Latest data, last-write-wins
    pub info: Option<SystemInfo>,
    pub config: Option<StrategyConfig>,
    pub summary: Option<Summary>,
    pub last_summary_at: Option<DateTime<Utc>>,

    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,

    /// Counters at the last report; deltas are computed against this.
    pub baseline: Baseline,
    /// Set once the first-data notification has been produced.
    pub initial_summary_sent: bool,
}

/// Read-only copy of a `BotState` handed to queries and notifications.
pub type BotSnapshot = BotState;

impl BotState {
    pub fn new(endpoint: &Endpoint) -> Self {
        Self {
            label: endpoint.label.clone(),
            address: endpoint.address.clone(),
            connected: false,
            last_connected_at: None,
            info: None,
            config: None,
            summary: None,
            last_summary_at: None,
            last_error: None,
            last_error_at: None,
            baseline: Baseline::default(),
            initial_summary_sent: false,
        }
    }

    pub fn mark_connected(&mut self, at: DateTime<Utc>) {
        self.connected = true;
        self.last_connected_at = Some(at);
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn set_info(&mut self, info: SystemInfo) {
        self.info = Some(info);
    }

    pub fn set_config(&mut self, config: StrategyConfig) {
        self.config = Some(config);
    }

    /// Store a new summary.
    ///
    /// Rejects a summary whose variant differs from the stored one; the
    /// stored summary is left untouched in that case.
    pub fn apply_summary(&mut self, summary: Summary, at: DateTime<Utc>) -> FeedResult<()> {
        if let Some(existing) = &self.summary {
            if existing.kind() != summary.kind() {
                return Err(FeedError::SummaryKindMismatch {
                    endpoint: self.label.clone(),
                    existing: existing.kind(),
                    received: summary.kind(),
                });
            }
        }
        self.summary = Some(summary);
        self.last_summary_at = Some(at);
        Ok(())
    }

    pub fn record_error(&mut self, message: String, at: DateTime<Utc>) {
        self.last_error = Some(message);
        self.last_error_at = Some(at);
    }

    /// Latch the one-shot initial summary.
    ///
    /// Returns true exactly once: the first time both `info` and `summary`
    /// are present. The baseline is moved to the current counters so the
    /// next digest measures from here.
    pub fn take_initial_summary(&mut self) -> bool {
        if self.initial_summary_sent || self.info.is_none() {
            return false;
        }
        let Some(summary) = &self.summary else {
            return false;
        };
        self.baseline = summary.baseline();
        self.initial_summary_sent = true;
        true
    }

    /// Delta of the current summary against the baseline.
    ///
    /// `None` without a summary, or when the counters are too far apart
    /// to subtract.
    pub fn delta(&self) -> Option<Delta> {
        self.summary
            .as_ref()
            .and_then(|s| Delta::between(&s.baseline(), &self.baseline))
    }

    /// Move the baseline to the current counters. No-op without a summary.
    pub fn reset_baseline(&mut self) {
        if let Some(summary) = &self.summary {
            self.baseline = summary.baseline();
        }
    }

    /// Digest step for this bot: snapshot and delta from the old baseline,
    /// then reset the baseline. Callers hold the entry lock across the call.
    pub fn take_digest(&mut self) -> (BotSnapshot, Option<Delta>) {
        let delta = self.delta();
        let snapshot = self.clone();
        self.reset_baseline();
        (snapshot, delta)
    }
}

type StateEntry = Arc<RwLock<BotState>>;

/// Read access to bot states for status queries.
pub trait SnapshotSource: Send + Sync {
    /// Copy of one bot's state, `None` for an unknown label.
    fn get_snapshot(&self, label: &str) -> Option<BotSnapshot>;

    /// Copies of every bot's state, in configuration order.
    fn get_all_snapshots(&self) -> Vec<BotSnapshot>;

    /// Configured labels, in configuration order.
    fn labels(&self) -> Vec<String>;
}

/// Store of all bot states, one lock per entry.
pub struct BotStates {
    entries: DashMap<String, StateEntry>,
    /// Configuration order, for stable listings.
    order: Vec<String>,
}

impl BotStates {
    /// Create one entry per endpoint. A repeated label keeps the first entry.
    pub fn new(endpoints: &[Endpoint]) -> Self {
        let entries = DashMap::new();
        let mut order = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if entries.contains_key(&endpoint.label) {
                debug!(label = %endpoint.label, "Duplicate endpoint label ignored");
                continue;
            }
            entries.insert(
                endpoint.label.clone(),
                Arc::new(RwLock::new(BotState::new(endpoint))),
            );
            order.push(endpoint.label.clone());
        }
        Self { entries, order }
    }

    /// Shared handle to one entry. The map guard is released before returning.
    pub fn entry(&self, label: &str) -> Option<StateEntry> {
        self.entries.get(label).map(|e| e.value().clone())
    }

    /// Run `f` with exclusive access to one bot's state.
    ///
    /// Returns `None` for an unknown label; nothing is created.
    pub fn with_state<R>(&self, label: &str, f: impl FnOnce(&mut BotState) -> R) -> Option<R> {
        let entry = self.entry(label)?;
        let mut guard = entry.write();
        Some(f(&mut guard))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Configured labels in order.
    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn get_snapshot(&self, label: &str) -> Option<BotSnapshot> {
        self.entry(label).map(|entry| entry.read().clone())
    }

    pub fn all_snapshots(&self) -> Vec<BotSnapshot> {
        self.order
            .iter()
            .filter_map(|label| self.get_snapshot(label))
            .collect()
    }

    /// Digest step over every bot, one entry lock at a time.
    pub fn take_digest(&self) -> Vec<(BotSnapshot, Option<Delta>)> {
        self.order
            .iter()
            .filter_map(|label| self.with_state(label, BotState::take_digest))
            .collect()
    }
}

impl SnapshotSource for BotStates {
    fn get_snapshot(&self, label: &str) -> Option<BotSnapshot> {
        BotStates::get_snapshot(self, label)
    }

    fn get_all_snapshots(&self) -> Vec<BotSnapshot> {
        self.all_snapshots()
    }

    fn labels(&self) -> Vec<String> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_core::{PerpGridSummary, SpacingRange, SpotGridSummary, SummaryKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("eth", "localhost:9000").unwrap(),
            Endpoint::new("hype", "localhost:9001").unwrap(),
        ]
    }

    fn spot(roundtrips: u64, matched: Decimal, fees: Decimal) -> Summary {
        Summary::SpotGrid(SpotGridSummary {
            symbol: "ETH/USDC".to_string(),
            state: "Running".to_string(),
            uptime: "1h".to_string(),
            position_size: dec!(1),
            matched_profit: matched,
            total_profit: matched,
            total_fees: fees,
            grid_count: 10,
            grid_range_low: dec!(3000),
            grid_range_high: dec!(4000),
            grid_spacing_pct: SpacingRange::new(dec!(1), dec!(1)),
            roundtrips,
            base_balance: dec!(1),
            quote_balance: dec!(100),
            initial_entry_price: None,
        })
    }

    fn perp() -> Summary {
        Summary::PerpGrid(PerpGridSummary {
            symbol: "HYPE".to_string(),
            state: "Running".to_string(),
            uptime: "1h".to_string(),
            position_size: dec!(0),
            position_side: "Flat".to_string(),
            matched_profit: dec!(0),
            total_profit: dec!(0),
            total_fees: dec!(0),
            leverage: 3,
            grid_bias: "neutral".to_string(),
            grid_count: 10,
            grid_range_low: dec!(20),
            grid_range_high: dec!(30),
            grid_spacing_pct: SpacingRange::new(dec!(0.5), dec!(0.5)),
            roundtrips: 0,
            margin_balance: dec!(100),
            initial_entry_price: None,
            avg_entry_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        })
    }

    fn info() -> SystemInfo {
        SystemInfo {
            network: "mainnet".to_string(),
            exchange: "hyperliquid".to_string(),
        }
    }

    #[test]
    fn test_entries_created_from_config_only() {
        let states = BotStates::new(&endpoints());
        assert_eq!(states.len(), 2);
        assert_eq!(states.labels(), &["eth".to_string(), "hype".to_string()]);
        assert!(states.with_state("ghost", |s| s.mark_disconnected()).is_none());
        assert!(!states.contains("ghost"));
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_summary_last_write_wins() {
        let mut state = BotState::new(&endpoints()[0]);
        state.apply_summary(spot(1, dec!(1), dec!(0.1)), Utc::now()).unwrap();
        state.apply_summary(spot(2, dec!(2), dec!(0.2)), Utc::now()).unwrap();
        assert_eq!(state.summary, Some(spot(2, dec!(2), dec!(0.2))));
        assert!(state.last_summary_at.is_some());
    }

    #[test]
    fn test_summary_kind_change_rejected() {
        let mut state = BotState::new(&endpoints()[0]);
        state.apply_summary(spot(1, dec!(1), dec!(0.1)), Utc::now()).unwrap();
        let err = state.apply_summary(perp(), Utc::now()).unwrap_err();
        match err {
            FeedError::SummaryKindMismatch { existing, received, .. } => {
                assert_eq!(existing, SummaryKind::SpotGrid);
                assert_eq!(received, SummaryKind::PerpGrid);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(state.summary.as_ref().map(Summary::kind), Some(SummaryKind::SpotGrid));
    }

    #[test]
    fn test_initial_summary_needs_info_and_latches() {
        let mut state = BotState::new(&endpoints()[0]);
        state.apply_summary(spot(5, dec!(10), dec!(1)), Utc::now()).unwrap();
        assert!(!state.take_initial_summary());

        state.set_info(info());
        assert!(state.take_initial_summary());
        assert_eq!(state.baseline, Baseline::new(5, dec!(10), dec!(1)));

        state.apply_summary(spot(6, dec!(11), dec!(1.1)), Utc::now()).unwrap();
        assert!(!state.take_initial_summary());
    }

    #[test]
    fn test_take_digest_uses_old_baseline_then_resets() {
        let mut state = BotState::new(&endpoints()[0]);
        state.baseline = Baseline::new(10, dec!(30.0), dec!(2.0));
        state.apply_summary(spot(12, dec!(45.23), dec!(3.12)), Utc::now()).unwrap();

        let (snapshot, delta) = state.take_digest();
        let delta = delta.unwrap();
        assert_eq!(delta.new_roundtrips, 2);
        assert_eq!(delta.matched_delta, dec!(15.23));
        assert_eq!(delta.fees_delta, dec!(1.12));
        assert_eq!(snapshot.baseline, Baseline::new(10, dec!(30.0), dec!(2.0)));
        assert_eq!(state.baseline, Baseline::new(12, dec!(45.23), dec!(3.12)));
        assert_eq!(state.delta().unwrap().new_roundtrips, 0);
    }

    #[test]
    fn test_digest_with_extreme_counters_does_not_panic() {
        let mut state = BotState::new(&endpoints()[0]);
        state.baseline = Baseline::new(0, Decimal::MIN, dec!(0));
        state.apply_summary(spot(1, Decimal::MAX, dec!(0)), Utc::now()).unwrap();

        let (_, delta) = state.take_digest();
        assert!(delta.is_none());
        // Baseline still moves, so the next digest is computable
        assert_eq!(state.delta().unwrap().new_roundtrips, 0);
    }

    #[test]
    fn test_digest_without_summary_has_no_delta() {
        let states = BotStates::new(&endpoints());
        let digest = states.take_digest();
        assert_eq!(digest.len(), 2);
        assert!(digest.iter().all(|(_, delta)| delta.is_none()));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let states = BotStates::new(&endpoints());
        let mut snapshot = states.get_snapshot("eth").unwrap();
        snapshot.connected = true;
        assert!(!states.get_snapshot("eth").unwrap().connected);
    }

    #[test]
    fn test_connection_status() {
        let states = BotStates::new(&endpoints());
        let now = Utc::now();
        states.with_state("hype", |s| s.mark_connected(now));
        let snap = states.get_snapshot("hype").unwrap();
        assert!(snap.connected);
        assert_eq!(snap.last_connected_at, Some(now));

        states.with_state("hype", BotState::mark_disconnected);
        assert!(!states.get_snapshot("hype").unwrap().connected);
    }
}
