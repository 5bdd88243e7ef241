//! Host → Guest Script Forms
//!
//! The host never splices user text into script syntax. Each builder emits
//! a single call into the injected `__jsbridge` runtime object, with every
//! string operand written as a JSON string literal. Argument fragments are
//! the only JSON text embedded directly, and [`validate_arguments`] rejects
//! malformed fragments before a script is built.

use serde::de::IgnoredAny;
use serde_json::Value;

use super::error::{BridgeError, Result};
use super::message::CallId;
use super::structured::StructuredError;

/// Global name of the interop runtime object inside the guest.
pub const RUNTIME_OBJECT: &str = "__jsbridge";

/// Global name of the object every transport provides for posting messages
/// back to the host (`jsbridgeHost.postMessage(text)`).
pub const HOST_CHANNEL_OBJECT: &str = "jsbridgeHost";

fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Runs the user library and reports the outcome on the reserved id.
pub fn boot(library_source: &str) -> String {
    format!("{RUNTIME_OBJECT}.boot({});", literal(library_source))
}

/// Invokes `function` (a dotted path or an inline function expression)
/// with the positional JSON argument fragments.
pub fn invoke(id: CallId, function: &str, args: &[String]) -> String {
    format!(
        "{RUNTIME_OBJECT}.invoke({id}, {}, [{}]);",
        literal(function),
        args.join(",")
    )
}

/// Settles a guest-initiated call with the JSON text of its result.
pub fn resolve(id: CallId, result: &str) -> String {
    format!("{RUNTIME_OBJECT}.resolve({id}, {});", literal(result))
}

/// Settles a guest-initiated call with a failure.
pub fn reject(id: CallId, error: &StructuredError) -> String {
    format!("{RUNTIME_OBJECT}.reject({id}, {});", error.to_payload())
}

/// Installs a forwarding stub at the dotted path `name`.
pub fn expose(name: &str) -> String {
    format!("{RUNTIME_OBJECT}.expose({});", literal(name))
}

/// Pre-creates an empty container at the dotted path `namespace`.
pub fn namespace(namespace: &str) -> String {
    format!("{RUNTIME_OBJECT}.namespace({});", literal(namespace))
}

/// Checks that every fragment is a complete JSON text.
pub fn validate_arguments(args: &[String]) -> Result<()> {
    for (index, fragment) in args.iter().enumerate() {
        serde_json::from_str::<IgnoredAny>(fragment).map_err(|e| {
            BridgeError::InvalidArgument {
                index,
                reason: e.to_string(),
            }
        })?;
    }
    Ok(())
}

/// Checks that `name` is a dotted path of JavaScript identifiers, e.g.
/// `Namespace.method`.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty() && name.split('.').all(is_identifier);
    if valid {
        Ok(())
    } else {
        Err(BridgeError::InvalidName(name.to_string()))
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
