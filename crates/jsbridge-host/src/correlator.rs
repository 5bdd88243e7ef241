//! Call Correlator
//!
//! Turns a one-shot request into an awaitable result across a channel whose
//! only link between request and response is a shared identifier.
//!
//! # Guarantees
//!
//! - Identifiers start at 1 (0 is reserved for the initialization outcome)
//!   and only ever increase, so an identifier is never reused
//! - Every slot is settled at most once: settling removes it from the table
//! - Responses for unknown identifiers (late or duplicate) are ignored
//! - Teardown rejects every slot still pending; no caller is left waiting

use jsbridge_common::{BridgeError, CallId, Result, INIT_CALL_ID};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outcome delivered to a pending call: raw JSON text or a failure.
pub type CallOutcome = Result<String>;

/// Callback run with the identifier of a call dropped before it settled.
type Release = Box<dyn FnOnce(CallId) + Send>;

/// The waiting half of an in-flight call.
///
/// Dropping it before the call settles (for example when the awaiting
/// future is cancelled) runs the release hook set by
/// [`on_abandon`](Self::on_abandon), so the slot does not stay parked.
pub struct PendingCall {
    id: CallId,
    receiver: oneshot::Receiver<CallOutcome>,
    release: Option<Release>,
}

impl PendingCall {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Sets the hook that frees this call's slot if it is dropped unsettled.
    ///
    /// # Arguments
    /// * `release` - Called once with the call identifier. It must not be
    ///   dropped while the correlator lock is held by the same thread.
    pub fn on_abandon(mut self, release: impl FnOnce(CallId) + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Suspends until the call is settled.
    pub async fn wait(mut self) -> CallOutcome {
        // The sender only disappears without settling when the correlator
        // itself was dropped, i.e. the bridge is gone.
        let outcome = (&mut self.receiver).await.unwrap_or(Err(BridgeError::Closed));
        self.release = None;
        outcome
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("armed", &self.release.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct Correlator {
    next_id: CallId,
    pending: HashMap<CallId, oneshot::Sender<CallOutcome>>,
    closed: Option<BridgeError>,
}

impl Correlator {
    /// Creates an empty, open correlator.
    ///
    /// # Returns
    /// A correlator whose first call gets identifier 1.
    pub fn new() -> Self {
        Self {
            next_id: INIT_CALL_ID + 1,
            pending: HashMap::new(),
            closed: None,
        }
    }

    /// Allocates the next identifier and parks a pending slot under it.
    ///
    /// # Errors
    ///
    /// Returns the teardown error once [`close`](Self::close) has run.
    pub fn begin_call(&mut self) -> Result<PendingCall> {
        if let Some(error) = &self.closed {
            return Err(error.clone());
        }

        let id = self.next_id;
        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(id, sender);
        tracing::trace!(id, pending = self.pending.len(), "call slot parked");

        Ok(PendingCall {
            id,
            receiver,
            release: None,
        })
    }

    /// Fulfills the slot for `id` with raw JSON text.
    ///
    /// Returns `false` when no such slot is pending.
    pub fn resolve(&mut self, id: CallId, raw: String) -> bool {
        self.settle(id, Ok(raw))
    }

    /// Fails the slot for `id`.
    ///
    /// Returns `false` when no such slot is pending.
    pub fn reject(&mut self, id: CallId, error: BridgeError) -> bool {
        self.settle(id, Err(error))
    }

    fn settle(&mut self, id: CallId, outcome: CallOutcome) -> bool {
        let Some(sender) = self.pending.remove(&id) else {
            tracing::trace!(id, "response for unknown call id ignored");
            return false;
        };
        // The caller may have stopped waiting; that is not an error here.
        let _ = sender.send(outcome);
        true
    }

    /// Removes the slot for `id` without settling it. Used when the
    /// invocation never left the host or its caller stopped waiting.
    ///
    /// Returns `false` when no such slot is pending.
    pub fn abandon(&mut self, id: CallId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Rejects every pending slot with `error` and clears the table.
    ///
    /// Returns the number of slots that were rejected.
    pub fn cancel_all(&mut self, error: BridgeError) -> usize {
        let count = self.pending.len();
        for (_, sender) in self.pending.drain() {
            let _ = sender.send(Err(error.clone()));
        }
        count
    }

    /// Cancels everything pending and refuses new calls from now on.
    pub fn close(&mut self, error: BridgeError) -> usize {
        if self.closed.is_none() {
            self.closed = Some(error.clone());
        }
        self.cancel_all(error)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Number of calls still waiting for a response.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
