//! Exact decimal conversion for JSON numbers.
//!
//! Bots report PnL and fee figures as JSON numbers. Converting through
//! `f64` would turn `45.23` into `45.229999...`, so numbers are converted
//! from their shortest textual form instead.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Convert a JSON number (or numeric string) into a `Decimal`.
///
/// Accepts plain (`"45.23"`), scientific (`1e-7`) and string-encoded numbers.
pub fn decimal_from_json(value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => parse_text(&n.to_string()),
        Value::String(s) => parse_text(s.trim()),
        other => Err(CoreError::InvalidNumber(format!("expected number, got {other}"))),
    }
}

fn parse_text(text: &str) -> Result<Decimal> {
    if text.contains(['e', 'E']) {
        return Ok(Decimal::from_scientific(text)?);
    }
    Ok(Decimal::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_float_is_exact() {
        assert_eq!(decimal_from_json(&json!(45.23)).unwrap(), dec!(45.23));
        assert_eq!(decimal_from_json(&json!(3.12)).unwrap(), dec!(3.12));
    }

    #[test]
    fn test_integer_and_string() {
        assert_eq!(decimal_from_json(&json!(12)).unwrap(), dec!(12));
        assert_eq!(decimal_from_json(&json!("-0.5")).unwrap(), dec!(-0.5));
    }

    #[test]
    fn test_scientific() {
        assert_eq!(decimal_from_json(&json!(1e-7)).unwrap(), dec!(0.0000001));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert!(decimal_from_json(&json!(null)).is_err());
        assert!(decimal_from_json(&json!(true)).is_err());
        assert!(decimal_from_json(&json!("abc")).is_err());
    }
}
