//! Inbound frame shape and client-to-aggregator events.

use crate::error::WsResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame from a bot.
///
/// Format: `{"event_type": "spot_grid_summary", "data": {...}}`.
/// Both fields are optional at decode time; a frame missing either is
/// decodable but not actionable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Frame {
    /// Decode a text frame.
    pub fn decode(text: &str) -> WsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Split into `(kind, payload)` when both are present.
    ///
    /// Returns `None` for an empty kind or a missing/null payload.
    pub fn into_parts(self) -> Option<(String, Value)> {
        let kind = self.event_type.filter(|k| !k.trim().is_empty())?;
        let payload = self.data.filter(|d| !d.is_null())?;
        Some((kind, payload))
    }
}

/// Event delivered by an `EndpointClient` to its consumer.
///
/// Events for one endpoint are delivered in receipt order.
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// Handshake succeeded.
    Connected { label: String },
    /// An established connection was lost. Sent once per lost connection.
    Disconnected { label: String, reason: String },
    /// An actionable frame.
    Frame {
        label: String,
        kind: String,
        payload: Value,
    },
}

impl EndpointEvent {
    pub fn label(&self) -> &str {
        match self {
            Self::Connected { label }
            | Self::Disconnected { label, .. }
            | Self::Frame { label, .. } => label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_actionable_frame() {
        let frame =
            Frame::decode(r#"{"event_type":"info","data":{"network":"mainnet"}}"#).unwrap();
        let (kind, payload) = frame.into_parts().unwrap();
        assert_eq!(kind, "info");
        assert_eq!(payload, json!({"network": "mainnet"}));
    }

    #[test]
    fn test_string_payload_is_actionable() {
        let frame = Frame::decode(r#"{"event_type":"error","data":"boom"}"#).unwrap();
        assert_eq!(frame.into_parts().unwrap().1, json!("boom"));
    }

    #[test]
    fn test_missing_parts_not_actionable() {
        let no_kind = Frame::decode(r#"{"data":{"x":1}}"#).unwrap();
        assert!(no_kind.into_parts().is_none());

        let empty_kind = Frame::decode(r#"{"event_type":"","data":{"x":1}}"#).unwrap();
        assert!(empty_kind.into_parts().is_none());

        let null_data = Frame::decode(r#"{"event_type":"info","data":null}"#).unwrap();
        assert!(null_data.into_parts().is_none());
    }

    #[test]
    fn test_undecodable_text() {
        tokio_test::assert_err!(Frame::decode("not json"));
        tokio_test::assert_err!(Frame::decode(r#"{"event_type": 5}"#));
    }
}
