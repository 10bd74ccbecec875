//! Identity and strategy configuration reported by a bot.

use crate::decimal::decimal_from_json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Exchange/network identity of a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Network name (e.g., "mainnet", "testnet").
    pub network: String,
    /// Exchange name (e.g., "hyperliquid").
    pub exchange: String,
}

/// Strategy configuration with an open attribute bag.
///
/// Only the strategy type and symbol are typed. Every other field the bot
/// sent is kept in `attributes` and read through the accessors below, which
/// apply the defaults for missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Strategy discriminator (e.g., "spot_grid", "perp_grid").
    pub strategy_type: String,
    /// Traded symbol.
    pub symbol: String,
    /// All fields of the config payload, verbatim.
    pub attributes: Map<String, Value>,
}

impl StrategyConfig {
    pub fn new(
        strategy_type: impl Into<String>,
        symbol: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            symbol: symbol.into(),
            attributes,
        }
    }

    /// Total investment; 0 when absent or not numeric.
    pub fn total_investment(&self) -> Decimal {
        self.decimal("total_investment").unwrap_or(Decimal::ZERO)
    }

    /// Trigger price; `None` when absent, null, or not numeric.
    pub fn trigger_price(&self) -> Option<Decimal> {
        self.decimal("trigger_price")
    }

    /// Isolated-margin flag; false when absent.
    pub fn is_isolated(&self) -> bool {
        self.attributes
            .get("is_isolated")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Raw attribute lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    fn decimal(&self, key: &str) -> Option<Decimal> {
        self.attributes
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| decimal_from_json(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn config_from(value: Value) -> StrategyConfig {
        let attributes = value.as_object().cloned().unwrap_or_default();
        StrategyConfig::new("perp_grid", "HYPE", attributes)
    }

    #[test]
    fn test_accessors_read_bag() {
        let cfg = config_from(json!({
            "type": "perp_grid",
            "symbol": "HYPE",
            "total_investment": 1000,
            "trigger_price": 24.5,
            "is_isolated": true,
            "leverage": 5
        }));
        assert_eq!(cfg.total_investment(), dec!(1000));
        assert_eq!(cfg.trigger_price(), Some(dec!(24.5)));
        assert!(cfg.is_isolated());
        assert_eq!(cfg.get("leverage"), Some(&json!(5)));
    }

    #[test]
    fn test_accessor_defaults() {
        let cfg = config_from(json!({"type": "spot_grid", "symbol": "ETH", "trigger_price": null}));
        assert_eq!(cfg.total_investment(), Decimal::ZERO);
        assert_eq!(cfg.trigger_price(), None);
        assert!(!cfg.is_isolated());
    }
}
