//! jsbridge Host
//!
//! This crate provides the host side of the bridge: the readiness gate that
//! holds every operation until the guest library has booted, the call
//! correlator that pairs host → guest calls with their responses, and the
//! registration table that routes guest → host calls to host functions.
//!
//! The embedded engine itself sits behind [`jsbridge_common::Transport`].

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod correlator;
mod dispatch;
pub mod readiness;
pub mod registry;

pub use adapter::{FromArguments, IntoArguments};
pub use bridge::Bridge;
pub use config::{BridgeConfig, UnregisteredMethodPolicy};
pub use dispatch::{INTEROP_RUNTIME, METHOD_NOT_FOUND_CODE};
pub use readiness::ReadinessState;
pub use registry::{HostFunction, HostResult};

pub use jsbridge_common::{
    BridgeError, HostError, InitializationError, PageRequest, Result, StructuredError, Transport,
    TransportEvent, TransportEvents,
};
