//! Wire codec for Phoenix channel frames.
//!
//! Every message on the socket — in either direction — is one UTF-8 JSON
//! object with exactly the keys `topic`, `event`, `payload`, and `ref`.
//! Replies are ordinary frames whose event is `phx_reply`; their payload
//! carries `{status, response}` and is parsed into [`Reply`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SensoctoError};

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A Phoenix channel frame.
///
/// Outbound request-style frames carry a ref unique within the connection;
/// one-way emissions carry a throwaway ref. Inbound frames with absent keys
/// decode to empty strings, a null payload, and a missing ref.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// The channel topic.
    #[serde(default)]
    pub topic: String,
    /// The event name.
    #[serde(default)]
    pub event: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: Value,
    /// Correlation token linking a request to its `phx_reply`.
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    /// Construct a frame.
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
        reference: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference,
        }
    }

    /// Serialize the frame to its JSON text representation.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(SensoctoError::Json)
    }

    /// Parse a frame from JSON text.
    ///
    /// Fails with [`SensoctoError::Protocol`] on malformed JSON; the
    /// dispatcher logs and discards such frames without tearing down the
    /// connection.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SensoctoError::Protocol(format!("malformed frame: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A parsed `phx_reply` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// `"ok"` or `"error"`.
    pub status: String,
    /// The server's response body.
    pub response: Value,
}

impl Reply {
    /// Parse a reply from a `phx_reply` frame payload.
    ///
    /// A missing status reads as `"error"`; a missing response reads as an
    /// empty object.
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            status: payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("error")
                .to_owned(),
            response: payload
                .get("response")
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        }
    }

    /// Whether the reply indicates success.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Whether the reply indicates an error.
    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    /// Extract a human-readable rejection reason from an error reply.
    ///
    /// Prefers the conventional `{"reason": …}` key, falling back to the
    /// serialized response body.
    pub fn error_reason(&self) -> String {
        self.response
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| self.response.to_string())
    }
}
