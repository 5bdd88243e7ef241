//! jsbridge Transport Contract
//!
//! A transport is the in-process channel between the host and one embedded
//! guest environment. It offers two things:
//!
//! - **Script evaluation** (host → guest), fire-and-forget through
//!   [`Transport::evaluate`]; outcomes come back as posted messages
//! - **Message posting** (guest → host), delivered as [`TransportEvent`]s on
//!   an unbounded channel handed to the bridge at construction time
//!
//! Every transport must make `jsbridgeHost.postMessage(text)` available on
//! the page global; the interop runtime posts all of its messages through it.
//!
//! Anything the transport needs from the embedding application, such as a
//! view to attach a hidden web view to, is passed to the transport's own
//! constructor. The bridge core never reaches for process-wide state.

use tokio::sync::mpsc;

use crate::protocol::error::Result;

/// Origin used when the caller does not override it.
pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// Parameters of the page a transport loads before anything else runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Origin the page is served from (`location.origin`).
    pub origin: String,
    /// Use non-persistent storage for the page.
    pub incognito: bool,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            incognito: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The page finished loading; scripts may now be evaluated.
    Loaded,
    /// The page could not be loaded.
    LoadFailed(String),
    /// The guest posted a message (JSON text).
    Message(String),
    /// The environment went away (navigation, suspension, crash).
    Terminated(String),
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// The in-process channel to one embedded guest environment.
pub trait Transport: Send + Sync {
    /// Starts loading the page. Completion is reported as
    /// [`TransportEvent::Loaded`] or [`TransportEvent::LoadFailed`].
    fn load(&self, page: &PageRequest) -> Result<()>;

    /// Queues a script for evaluation in the guest. Scripts run in the order
    /// they were queued.
    fn evaluate(&self, script: String) -> Result<()>;

    /// Tears the environment down. Idempotent.
    fn close(&self);
}
