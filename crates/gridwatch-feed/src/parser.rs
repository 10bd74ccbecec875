//! Event parsing for bot frames.
//!
//! Converts a `(kind, payload)` pair into a `BotEvent`. Parsing is pure: a
//! failure is returned as `FeedError::Parse` and nothing else happens.
//!
//! Wire kinds:
//! - `info` -> `BotEvent::Info`
//! - `config` -> `BotEvent::Config`
//! - `spot_grid_summary` / `perp_grid_summary` -> `BotEvent::Summary`
//! - `error` -> `BotEvent::Error`
//! - anything else (`market_update`, `order_update`, `grid_state`, ...) -> `BotEvent::Ignored`

use crate::error::{FeedError, FeedResult};
use gridwatch_core::{
    decimal_from_json, PerpGridSummary, SpacingRange, SpotGridSummary, StrategyConfig, Summary,
    SystemInfo,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::fmt;

/// Classification of a wire kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Info,
    Config,
    SpotSummary,
    PerpSummary,
    Error,
    Ignored,
}

impl EventKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "info" => Self::Info,
            "config" => Self::Config,
            "spot_grid_summary" => Self::SpotSummary,
            "perp_grid_summary" => Self::PerpSummary,
            "error" => Self::Error,
            _ => Self::Ignored,
        }
    }

    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Config => "config",
            Self::SpotSummary => "spot_summary",
            Self::PerpSummary => "perp_summary",
            Self::Error => "error",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed bot event.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    Info(SystemInfo),
    Config(StrategyConfig),
    Summary(Summary),
    /// Error reported by the bot itself.
    Error(String),
    /// Kind not used by the monitor; carries the wire name.
    Ignored(String),
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Info(_) => EventKind::Info,
            Self::Config(_) => EventKind::Config,
            Self::Summary(Summary::SpotGrid(_)) => EventKind::SpotSummary,
            Self::Summary(Summary::PerpGrid(_)) => EventKind::PerpSummary,
            Self::Error(_) => EventKind::Error,
            Self::Ignored(_) => EventKind::Ignored,
        }
    }
}

/// Stateless parser for bot events.
pub struct EventParser;

impl EventParser {
    /// Parse one frame for the endpoint `label`.
    pub fn parse(label: &str, kind: &str, payload: &Value) -> FeedResult<BotEvent> {
        let event = match EventKind::from_wire(kind) {
            EventKind::Info => parse_system_info(payload).map(BotEvent::Info),
            EventKind::Config => parse_strategy_config(payload).map(BotEvent::Config),
            EventKind::SpotSummary => {
                parse_spot_summary(payload).map(|s| BotEvent::Summary(Summary::SpotGrid(s)))
            }
            EventKind::PerpSummary => {
                parse_perp_summary(payload).map(|s| BotEvent::Summary(Summary::PerpGrid(s)))
            }
            EventKind::Error => Ok(BotEvent::Error(error_message(payload))),
            EventKind::Ignored => Ok(BotEvent::Ignored(kind.to_string())),
        };
        event.map_err(|cause| FeedError::parse(label, kind, cause))
    }
}

/// Parse failure cause, wrapped into `FeedError::Parse` by the caller.
type FieldResult<T> = Result<T, String>;

/// Typed access to the fields of an object payload.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn of(payload: &'a Value) -> FieldResult<Self> {
        payload
            .as_object()
            .map(Fields)
            .ok_or_else(|| format!("payload is not an object: {payload}"))
    }

    fn required(&self, key: &str) -> FieldResult<&'a Value> {
        match self.0.get(key) {
            Some(Value::Null) | None => Err(format!("missing field `{key}`")),
            Some(v) => Ok(v),
        }
    }

    fn string(&self, key: &str) -> FieldResult<String> {
        self.required(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("field `{key}` is not a string"))
    }

    fn decimal(&self, key: &str) -> FieldResult<Decimal> {
        let value = self.required(key)?;
        decimal_from_json(value).map_err(|e| format!("field `{key}`: {e}"))
    }

    /// Required decimal that may arrive under an older alias.
    fn decimal_or_alias(&self, key: &str, alias: &str) -> FieldResult<Decimal> {
        if self.is_present(key) || !self.is_present(alias) {
            self.decimal(key)
        } else {
            self.decimal(alias)
        }
    }

    /// Absent or null -> `None`; present but not numeric is an error.
    fn optional_decimal(&self, key: &str) -> FieldResult<Option<Decimal>> {
        if !self.is_present(key) {
            return Ok(None);
        }
        self.decimal(key).map(Some)
    }

    fn u64(&self, key: &str) -> FieldResult<u64> {
        self.required(key)?
            .as_u64()
            .ok_or_else(|| format!("field `{key}` is not a non-negative integer"))
    }

    fn u32(&self, key: &str) -> FieldResult<u32> {
        let value = self.u64(key)?;
        u32::try_from(value).map_err(|_| format!("field `{key}` out of range: {value}"))
    }

    fn spacing(&self, key: &str) -> FieldResult<SpacingRange> {
        let bounds = self
            .required(key)?
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| format!("field `{key}` is not a two-element array"))?;
        let min = decimal_from_json(&bounds[0]).map_err(|e| format!("field `{key}`[0]: {e}"))?;
        let max = decimal_from_json(&bounds[1]).map_err(|e| format!("field `{key}`[1]: {e}"))?;
        Ok(SpacingRange::new(min, max))
    }

    fn is_present(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(v) if !v.is_null())
    }
}

fn parse_system_info(payload: &Value) -> FieldResult<SystemInfo> {
    let f = Fields::of(payload)?;
    Ok(SystemInfo {
        network: f.string("network")?,
        exchange: f.string("exchange")?,
    })
}

/// `type` and `symbol` are typed; the whole payload is kept as the bag.
fn parse_strategy_config(payload: &Value) -> FieldResult<StrategyConfig> {
    let f = Fields::of(payload)?;
    Ok(StrategyConfig::new(
        f.string("type")?,
        f.string("symbol")?,
        f.0.clone(),
    ))
}

fn parse_spot_summary(payload: &Value) -> FieldResult<SpotGridSummary> {
    let f = Fields::of(payload)?;
    Ok(SpotGridSummary {
        symbol: f.string("symbol")?,
        state: f.string("state")?,
        uptime: f.string("uptime")?,
        position_size: f.decimal("position_size")?,
        matched_profit: f.decimal("matched_profit")?,
        total_profit: f.decimal("total_profit")?,
        total_fees: f.decimal("total_fees")?,
        grid_count: f.u32("grid_count")?,
        grid_range_low: f.decimal_or_alias("grid_range_low", "range_low")?,
        grid_range_high: f.decimal_or_alias("grid_range_high", "range_high")?,
        grid_spacing_pct: f.spacing("grid_spacing_pct")?,
        roundtrips: f.u64("roundtrips")?,
        base_balance: f.decimal("base_balance")?,
        quote_balance: f.decimal("quote_balance")?,
        initial_entry_price: f.optional_decimal("initial_entry_price")?,
    })
}

fn parse_perp_summary(payload: &Value) -> FieldResult<PerpGridSummary> {
    let f = Fields::of(payload)?;
    Ok(PerpGridSummary {
        symbol: f.string("symbol")?,
        state: f.string("state")?,
        uptime: f.string("uptime")?,
        position_size: f.decimal("position_size")?,
        position_side: f.string("position_side")?,
        matched_profit: f.decimal("matched_profit")?,
        total_profit: f.decimal("total_profit")?,
        total_fees: f.decimal("total_fees")?,
        leverage: f.u32("leverage")?,
        grid_bias: f.string("grid_bias")?,
        grid_count: f.u32("grid_count")?,
        grid_range_low: f.decimal_or_alias("grid_range_low", "range_low")?,
        grid_range_high: f.decimal_or_alias("grid_range_high", "range_high")?,
        grid_spacing_pct: f.spacing("grid_spacing_pct")?,
        roundtrips: f.u64("roundtrips")?,
        margin_balance: f.decimal("margin_balance")?,
        initial_entry_price: f.optional_decimal("initial_entry_price")?,
        avg_entry_price: f.optional_decimal("avg_entry_price")?.unwrap_or(Decimal::ZERO),
        unrealized_pnl: f.optional_decimal("unrealized_pnl")?.unwrap_or(Decimal::ZERO),
    })
}

fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
