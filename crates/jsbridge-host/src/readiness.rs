//! Readiness Gate
//!
//! Sequences bridge construction so that nothing is invoked before the
//! guest environment is usable:
//!
//! ```text
//! Uninitialized → AwaitingTransportLoad → InjectingRuntime → RunningUserCode → Ready
//!        \______________________\___________________\__________________\___→ Failed(error)
//! ```
//!
//! `Failed` is terminal and sticky: every waiter, present and future,
//! receives the same error. There is no retry.

use jsbridge_common::{BridgeError, Result};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum ReadinessState {
    Uninitialized,
    AwaitingTransportLoad,
    InjectingRuntime,
    RunningUserCode,
    Ready,
    Failed(BridgeError),
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed(_))
    }

    fn precedes(&self, next: &ReadinessState) -> bool {
        use ReadinessState::*;
        matches!(
            (self, next),
            (Uninitialized, AwaitingTransportLoad)
                | (AwaitingTransportLoad, InjectingRuntime)
                | (InjectingRuntime, RunningUserCode)
                | (RunningUserCode, Ready)
        )
    }
}

#[derive(Debug)]
pub struct ReadinessGate {
    state: watch::Sender<ReadinessState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ReadinessState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> ReadinessState {
        self.state.borrow().clone()
    }

    /// Moves to `next` if it directly follows the current state.
    ///
    /// Returns `false` (and changes nothing) for any other transition,
    /// including every transition out of `Ready` or `Failed`.
    pub fn advance(&self, next: ReadinessState) -> bool {
        let advanced = self.state.send_if_modified(|current| {
            if current.precedes(&next) {
                *current = next.clone();
                true
            } else {
                false
            }
        });
        if advanced {
            tracing::info!(state = ?next, "bridge readiness advanced");
        } else {
            tracing::debug!(state = ?next, "ignored out-of-order readiness transition");
        }
        advanced
    }

    /// Fails initialization unless it already reached a terminal state.
    pub fn fail(&self, error: BridgeError) -> bool {
        let failed = self.state.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = ReadinessState::Failed(error.clone());
                true
            }
        });
        if failed {
            tracing::warn!(%error, "bridge initialization failed");
        }
        failed
    }

    /// Suspends until the gate is `Ready` or `Failed`.
    pub async fn wait(&self) -> Result<()> {
        let mut receiver = self.state.subscribe();
        loop {
            let outcome = match &*receiver.borrow_and_update() {
                ReadinessState::Ready => Some(Ok(())),
                ReadinessState::Failed(error) => Some(Err(error.clone())),
                _ => None,
            };
            if let Some(outcome) = outcome {
                return outcome;
            }
            if receiver.changed().await.is_err() {
                return Err(BridgeError::Closed);
            }
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
