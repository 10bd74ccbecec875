//! Monitored endpoint identity.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One monitored bot: operator-facing label plus stream address.
///
/// Immutable after configuration load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique, operator-facing name.
    pub label: String,
    /// WebSocket URL (always carries a `ws://` or `wss://` scheme).
    pub address: String,
}

impl Endpoint {
    /// Create an endpoint, normalising the address scheme.
    pub fn new(label: impl Into<String>, address: impl AsRef<str>) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(CoreError::InvalidEndpoint("label is empty".to_string()));
        }
        let address = normalize_address(address.as_ref());
        if address.is_empty() {
            return Err(CoreError::InvalidEndpoint(format!(
                "address for {label} is empty"
            )));
        }
        Ok(Self { label, address })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.address)
    }
}

/// Prefix `ws://` when the address carries no WebSocket scheme.
///
/// Returns an empty string for blank input.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_scheme() {
        let ep = Endpoint::new("eth", " localhost:9000 ").unwrap();
        assert_eq!(ep.address, "ws://localhost:9000");
    }

    #[test]
    fn test_keeps_secure_scheme() {
        let ep = Endpoint::new("eth", "wss://bot.example.com/ws").unwrap();
        assert_eq!(ep.address, "wss://bot.example.com/ws");
    }

    #[test]
    fn test_rejects_blank() {
        assert!(Endpoint::new("", "localhost:9000").is_err());
        assert!(Endpoint::new("eth", "  ").is_err());
    }
}
