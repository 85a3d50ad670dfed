//! Wire envelopes exchanged with the timing server.
//!
//! Outbound: `{"token": "...", "command": "...", "data": ...}`
//! Inbound: `{"identifier": "...", "data": ...}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{EnvelopeError, Result};
use crate::ids::MessageToken;

/// A command queued for, or sent to, the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Correlation token generated at enqueue time.
    pub token: MessageToken,
    /// Command name, e.g. `getStatus`.
    pub command: String,
    /// Arbitrary command payload.
    pub data: Value,
}

impl OutboundEnvelope {
    /// Build an envelope with a freshly generated token.
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            token: MessageToken::generate(),
            command: command.into(),
            data,
        }
    }

    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InboundEnvelope {
    /// Event identifier; absent, empty, or non-string identifiers decode to `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Event payload, `Null` when the frame carries none.
    pub data: Value,
    /// Token echoed by the server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Any other top-level fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundEnvelope {
    /// Decode a text frame. Only JSON objects are accepted.
    pub fn decode(text: &str) -> Result<Self> {
        let mut map = match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            other => return Err(EnvelopeError::NotAnObject(json_kind(&other))),
        };

        let identifier = take_non_empty_string(&mut map, "identifier");
        let token = take_non_empty_string(&mut map, "token");
        let data = map.remove("data").unwrap_or(Value::Null);

        Ok(Self {
            identifier,
            data,
            token,
            extra: map,
        })
    }
}

fn take_non_empty_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(other) => {
            // Non-string values stay visible to consumers through `extra`.
            if !matches!(other, Value::String(_)) {
                let _ = map.insert(key.to_owned(), other);
            }
            None
        }
        None => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
