//! Grid strategy summaries and digest deltas.
//!
//! A bot reports exactly one summary shape for its whole lifetime:
//! spot-grid or perp-grid. `Summary` is the closed sum of the two and all
//! consumers match on it exhaustively.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid spacing as a percentage range `(min%, max%)`.
///
/// Geometric grids report equal bounds, arithmetic grids a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacingRange {
    pub min_pct: Decimal,
    pub max_pct: Decimal,
}

impl SpacingRange {
    pub fn new(min_pct: Decimal, max_pct: Decimal) -> Self {
        Self { min_pct, max_pct }
    }
}

/// Spot grid strategy summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotGridSummary {
    pub symbol: String,
    /// Strategy state ("Initializing", "Running", "AcquiringAssets", "WaitingForTrigger").
    pub state: String,
    /// Human-readable uptime, e.g. "2d 14h 30m".
    pub uptime: String,
    /// Base asset inventory.
    pub position_size: Decimal,
    pub matched_profit: Decimal,
    pub total_profit: Decimal,
    pub total_fees: Decimal,
    pub grid_count: u32,
    pub grid_range_low: Decimal,
    pub grid_range_high: Decimal,
    pub grid_spacing_pct: SpacingRange,
    pub roundtrips: u64,
    pub base_balance: Decimal,
    pub quote_balance: Decimal,
    pub initial_entry_price: Option<Decimal>,
}

/// Perp grid strategy summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpGridSummary {
    pub symbol: String,
    pub state: String,
    pub uptime: String,
    /// Signed position: positive = long, negative = short.
    pub position_size: Decimal,
    /// "Long", "Short" or "Flat".
    pub position_side: String,
    pub matched_profit: Decimal,
    pub total_profit: Decimal,
    pub total_fees: Decimal,
    pub leverage: u32,
    /// "long", "short" or "neutral".
    pub grid_bias: String,
    pub grid_count: u32,
    pub grid_range_low: Decimal,
    pub grid_range_high: Decimal,
    pub grid_spacing_pct: SpacingRange,
    pub roundtrips: u64,
    pub margin_balance: Decimal,
    pub initial_entry_price: Option<Decimal>,
    /// Zero when the bot did not report it.
    pub avg_entry_price: Decimal,
    /// Zero when the bot did not report it.
    pub unrealized_pnl: Decimal,
}

impl PerpGridSummary {
    /// Realized plus unrealized PnL, net of fees.
    ///
    /// Saturates at the `Decimal` bounds instead of overflowing.
    pub fn net_pnl(&self) -> Decimal {
        self.matched_profit
            .saturating_add(self.unrealized_pnl)
            .saturating_sub(self.total_fees)
    }
}

/// Discriminator of a `Summary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    SpotGrid,
    PerpGrid,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpotGrid => write!(f, "spot_grid"),
            Self::PerpGrid => write!(f, "perp_grid"),
        }
    }
}

/// Latest summary of a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    SpotGrid(SpotGridSummary),
    PerpGrid(PerpGridSummary),
}

impl Summary {
    pub fn kind(&self) -> SummaryKind {
        match self {
            Self::SpotGrid(_) => SummaryKind::SpotGrid,
            Self::PerpGrid(_) => SummaryKind::PerpGrid,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::SpotGrid(s) => &s.symbol,
            Self::PerpGrid(s) => &s.symbol,
        }
    }

    pub fn state(&self) -> &str {
        match self {
            Self::SpotGrid(s) => &s.state,
            Self::PerpGrid(s) => &s.state,
        }
    }

    /// Cumulative counters used for digest deltas.
    pub fn baseline(&self) -> Baseline {
        match self {
            Self::SpotGrid(s) => Baseline::new(s.roundtrips, s.matched_profit, s.total_fees),
            Self::PerpGrid(s) => Baseline::new(s.roundtrips, s.matched_profit, s.total_fees),
        }
    }
}

/// Snapshot of the cumulative counters at the last report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub roundtrips: u64,
    pub matched_profit: Decimal,
    pub total_fees: Decimal,
}

impl Baseline {
    pub fn new(roundtrips: u64, matched_profit: Decimal, total_fees: Decimal) -> Self {
        Self {
            roundtrips,
            matched_profit,
            total_fees,
        }
    }
}

/// Change in cumulative counters since the previous baseline.
///
/// Signed: a bot restart resets its counters, which shows up as a negative delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub new_roundtrips: i64,
    pub matched_delta: Decimal,
    pub fees_delta: Decimal,
}

impl Delta {
    /// `current - previous`, field by field.
    ///
    /// `None` when a difference does not fit (counters near the numeric
    /// bounds); the digest then reports the bot without a delta.
    pub fn between(current: &Baseline, previous: &Baseline) -> Option<Self> {
        let roundtrips = i128::from(current.roundtrips) - i128::from(previous.roundtrips);
        Some(Self {
            new_roundtrips: i64::try_from(roundtrips).ok()?,
            matched_delta: current.matched_profit.checked_sub(previous.matched_profit)?,
            fees_delta: current.total_fees.checked_sub(previous.total_fees)?,
        })
    }
}
