//! jsbridge Common Types and Transport Contract
//!
//! This crate provides the protocol definitions and the transport contract
//! shared by the host core and by every embedded guest environment.
//!
//! # Overview
//!
//! jsbridge exposes functions of a JavaScript library running inside an
//! embedded engine as asynchronous host-callable operations, and host
//! functions as JavaScript-callable operations. Everything that crosses the
//! boundary is JSON text:
//!
//! - **Protocol Layer**: guest messages, call identifiers, the structured
//!   error model and the host→guest script forms
//! - **Transport Layer**: the [`Transport`](transport::Transport) trait and
//!   the events a guest environment delivers back to the host
//!
//! # Wire Format
//!
//! Guest → host, one JSON object per message:
//!
//! - `{ "id": 3, "result": "<JSON text>" }` - success response
//! - `{ "id": 3, "error": { "name": ..., "message": ..., ... } }` - failure response
//! - `{ "id": 7, "method": "Host.add", "params": ["1", "2"] }` - guest-initiated call
//!
//! Host → guest traffic is script evaluation against the injected
//! `__jsbridge` runtime object (see [`protocol::script`]).
//!
//! # Example
//!
//! ```
//! use jsbridge_common::{GuestMessage, StructuredError};
//!
//! let message = GuestMessage::decode(r#"{"id":1,"error":null}"#).unwrap();
//! assert_eq!(message, GuestMessage::Reject { id: 1, error: StructuredError::default() });
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{PageRequest, Transport, TransportEvent, TransportEvents, DEFAULT_ORIGIN};
