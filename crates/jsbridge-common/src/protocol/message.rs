//! Guest → Host Messages
//!
//! Every message posted by the guest runtime is a JSON object tagged by the
//! keys it carries rather than by an explicit type field:
//!
//! | Keys | Meaning |
//! |------|---------|
//! | `id`, `method`, `params` | guest-initiated call of a host function |
//! | `id`, `error` | failure response to a host-initiated call |
//! | `id`, `result` | success response to a host-initiated call |
//!
//! Identifier `0` is reserved for the one-time initialization outcome.
//! Messages without a usable `id`, or with none of the tagging keys, decode
//! to `None` and are ignored by the host.

use serde_json::{Map, Value};

use super::structured::StructuredError;

/// Identifier of an in-flight call in one direction.
pub type CallId = u64;

/// Identifier carrying the outcome of library initialization.
pub const INIT_CALL_ID: CallId = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum GuestMessage {
    /// A host-initiated call completed; `result` is raw JSON text.
    Resolve { id: CallId, result: String },
    /// A host-initiated call failed.
    Reject { id: CallId, error: StructuredError },
    /// The guest calls a host-registered function by name.
    Invoke {
        id: CallId,
        method: String,
        params: Vec<String>,
    },
}

impl GuestMessage {
    /// Decodes one posted message. Malformed messages yield `None`.
    pub fn decode(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let id = fields.get("id")?.as_u64()?;

        if let Some(method) = fields.get("method") {
            let method = method.as_str()?.to_string();
            let params = match fields.get("params") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.iter().map(json_text).collect(),
                Some(_) => return None,
            };
            return Some(GuestMessage::Invoke { id, method, params });
        }

        // Presence of the key decides: `error: null` is a failure whose
        // payload takes every default.
        if let Some(error) = fields.get("error") {
            return Some(GuestMessage::Reject {
                id,
                error: StructuredError::from_payload(error),
            });
        }

        fields.get("result").map(|result| GuestMessage::Resolve {
            id,
            result: json_text(result),
        })
    }

    pub fn id(&self) -> CallId {
        match self {
            GuestMessage::Resolve { id, .. }
            | GuestMessage::Reject { id, .. }
            | GuestMessage::Invoke { id, .. } => *id,
        }
    }

    /// Encodes the message the way the guest runtime posts it.
    pub fn encode(&self) -> String {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(self.id()));
        match self {
            GuestMessage::Resolve { result, .. } => {
                fields.insert("result".into(), Value::String(result.clone()));
            }
            GuestMessage::Reject { error, .. } => {
                fields.insert("error".into(), error.to_payload());
            }
            GuestMessage::Invoke { method, params, .. } => {
                fields.insert("method".into(), Value::String(method.clone()));
                fields.insert(
                    "params".into(),
                    Value::Array(params.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        Value::Object(fields).to_string()
    }
}

/// The runtime sends results and parameters as JSON text inside a string.
/// A value that arrives already decoded is re-encoded instead.
fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
