//! Structured Cross-Boundary Errors
//!
//! A [`StructuredError`] is the normalized representation of a failure that
//! crosses the host/guest boundary in either direction.
//!
//! # Defaulting Rules
//!
//! Every field is read independently from the failure payload. A field that
//! is missing or of the wrong shape takes its default, and a payload that is
//! not an object at all (guest code throwing `null` or a string) takes the
//! default for every field:
//!
//! | Field | Default |
//! |-------|---------|
//! | `name` | `"Error"` |
//! | `message` | `"Unknown error"` |
//! | `stack` | `"<unknown>"` |
//! | `line` | `0` |
//! | `column` | `0` |
//! | `code` | absent |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_NAME: &str = "Error";
pub const DEFAULT_MESSAGE: &str = "Unknown error";
pub const DEFAULT_STACK: &str = "<unknown>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub name: String,
    pub message: String,
    pub stack: String,
    pub line: i64,
    pub column: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StructuredError {
    /// Creates an error with the given name and message; the remaining
    /// fields take their defaults.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates a generic `Error` carrying only a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAME, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builds an error from an arbitrary failure payload.
    ///
    /// Never fails: anything unusable falls back to the defaults listed in
    /// the module documentation.
    pub fn from_payload(payload: &Value) -> Self {
        let Some(fields) = payload.as_object() else {
            return Self::default();
        };

        let text = |key: &str, default: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        Self {
            name: text("name", DEFAULT_NAME),
            message: text("message", DEFAULT_MESSAGE),
            stack: text("stack", DEFAULT_STACK),
            line: fields.get("line").and_then(integer).unwrap_or(0),
            column: fields.get("column").and_then(integer).unwrap_or(0),
            code: fields.get("code").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// Serializes the error as the payload object carried on the wire.
    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::json!({
            "name": self.name,
            "message": self.message,
            "stack": self.stack,
            "line": self.line,
            "column": self.column,
        });
        if let (Some(code), Some(fields)) = (&self.code, payload.as_object_mut()) {
            fields.insert("code".into(), Value::String(code.clone()));
        }
        payload
    }
}

// JavaScript numbers arrive as floats when they went through arithmetic.
fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

impl Default for StructuredError {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            message: DEFAULT_MESSAGE.into(),
            stack: DEFAULT_STACK.into(),
            line: 0,
            column: 0,
            code: None,
        }
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for StructuredError {}

/// Failure of a host-registered function.
///
/// A structured failure is forwarded to the guest verbatim, `code`
/// included. Anything else is degraded to a generic error that carries
/// only its description as the message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    Structured(StructuredError),
    Message(String),
}

impl HostError {
    pub fn into_structured(self) -> StructuredError {
        match self {
            HostError::Structured(error) => error,
            HostError::Message(message) => StructuredError::with_message(message),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Structured(error) => error.fmt(f),
            HostError::Message(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for HostError {}

impl From<StructuredError> for HostError {
    fn from(error: StructuredError) -> Self {
        HostError::Structured(error)
    }
}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        HostError::Message(message)
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        HostError::Message(message.to_string())
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Message(err.to_string())
    }
}

impl From<super::error::BridgeError> for HostError {
    fn from(err: super::error::BridgeError) -> Self {
        match err.structured() {
            Some(error) => HostError::Structured(error.clone()),
            None => HostError::Message(err.to_string()),
        }
    }
}
