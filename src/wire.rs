//! Wire envelope for the WebSocket signaling transport.
//!
//! Every frame is a single JSON object carrying an event name, a data
//! payload, and an optional client-supplied ack id used to correlate a
//! single-value reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound frame from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "ackId", default)]
    pub ack_id: Option<String>,
}

/// An outbound frame to a client.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    pub event: String,
    pub data: Value,
}

impl OutboundEnvelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

/// The `ack` envelope shape, keyed back to the client's `ackId`.
#[derive(Debug, Clone, Serialize)]
pub struct AckEnvelope {
    pub event: &'static str,
    #[serde(rename = "ackId")]
    pub ack_id: String,
    pub data: Value,
}

impl AckEnvelope {
    pub fn ok(ack_id: String, data: Value) -> Self {
        Self { event: "ack", ack_id, data }
    }

    pub fn err(ack_id: String, code: &str) -> Self {
        Self {
            event: "ack",
            ack_id,
            data: serde_json::json!({ "ok": false, "error": code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_envelope_defaults_data_to_null() {
        let env: InboundEnvelope = serde_json::from_str(r#"{"event":"start"}"#).unwrap();
        assert_eq!(env.event, "start");
        assert!(env.data.is_null());
        assert!(env.ack_id.is_none());
    }
}
