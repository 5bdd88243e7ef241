//! Transport event loop and message routing.
//!
//! One task per bridge drains the transport's event channel:
//!
//! - `Loaded` drives the readiness gate through runtime injection and the
//!   library boot
//! - responses on the reserved id settle initialization; all other
//!   responses settle the matching pending call
//! - guest-initiated calls are looked up in the registration table and run
//!   on their own task, and their outcome is sent back as a script
//! - `Terminated`, or the channel closing, tears the bridge down

use jsbridge_common::{
    script, BridgeError, CallId, GuestMessage, HostError, InitializationError, StructuredError,
    TransportEvent, TransportEvents, INIT_CALL_ID,
};
use std::sync::{Arc, Weak};

use crate::bridge::BridgeContext;
use crate::config::UnregisteredMethodPolicy;
use crate::readiness::ReadinessState;

/// Interop runtime injected into every guest page before the library runs.
pub const INTEROP_RUNTIME: &str = include_str!("runtime.js");

/// `code` of the rejection sent for calls to unregistered host functions.
pub const METHOD_NOT_FOUND_CODE: &str = "E_METHOD_NOT_FOUND";

pub(crate) async fn run(context: Weak<BridgeContext>, mut events: TransportEvents) {
    while let Some(event) = events.recv().await {
        let Some(context) = context.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Loaded => on_loaded(&context),
            TransportEvent::LoadFailed(reason) => {
                context
                    .gate
                    .fail(InitializationError::TransportLoad(reason).into());
            }
            TransportEvent::Message(text) => on_message(&context, &text),
            TransportEvent::Terminated(reason) => {
                context.shutdown(BridgeError::Terminated(reason));
                return;
            }
        }
    }

    if let Some(context) = context.upgrade() {
        context.shutdown(BridgeError::Terminated("transport event channel closed".into()));
    }
}

fn on_loaded(context: &BridgeContext) {
    if !context.gate.advance(ReadinessState::InjectingRuntime) {
        return;
    }
    if let Err(e) = context.transport.evaluate(INTEROP_RUNTIME.to_string()) {
        context
            .gate
            .fail(InitializationError::TransportLoad(e.to_string()).into());
        return;
    }

    context.gate.advance(ReadinessState::RunningUserCode);
    let library = context.take_library().unwrap_or_default();
    if let Err(e) = context.transport.evaluate(script::boot(&library)) {
        context
            .gate
            .fail(InitializationError::TransportLoad(e.to_string()).into());
    }
}

fn on_message(context: &Arc<BridgeContext>, text: &str) {
    let Some(message) = GuestMessage::decode(text) else {
        tracing::warn!(raw = text, "ignoring malformed guest message");
        return;
    };

    match message {
        GuestMessage::Resolve { id: INIT_CALL_ID, .. } => {
            context.gate.advance(ReadinessState::Ready);
        }
        GuestMessage::Reject { id: INIT_CALL_ID, error } => {
            if context.gate.state() == ReadinessState::RunningUserCode {
                context
                    .gate
                    .fail(InitializationError::LibraryThrew(error).into());
            }
        }
        GuestMessage::Resolve { id, result } => {
            context.correlator().resolve(id, result);
        }
        GuestMessage::Reject { id, error } => {
            context.correlator().reject(id, BridgeError::Guest(error));
        }
        GuestMessage::Invoke { id, method, params } => {
            on_invoke(Arc::clone(context), id, method, params);
        }
    }
}

fn on_invoke(context: Arc<BridgeContext>, id: CallId, method: String, params: Vec<String>) {
    let function = context.registry().get(&method);
    let Some(function) = function else {
        match context.config.unregistered_method {
            UnregisteredMethodPolicy::Drop => {
                tracing::warn!(id, method = %method, "dropping call to unregistered host function");
            }
            UnregisteredMethodPolicy::Reject => {
                tracing::warn!(id, method = %method, "rejecting call to unregistered host function");
                let error = StructuredError::new(
                    "ReferenceError",
                    format!("{} is not a registered host function", method),
                )
                .with_code(METHOD_NOT_FOUND_CODE);
                reply(&context, id, Err(error));
            }
        }
        return;
    };

    tracing::debug!(id, method = %method, arguments = params.len(), "guest called host function");
    tokio::spawn(async move {
        // Run the implementation on its own task so a panic surfaces as a
        // JoinError here instead of stranding the guest caller.
        let outcome = match tokio::spawn(async move { function.invoke(params).await }).await {
            Ok(outcome) => outcome.map_err(HostError::into_structured),
            Err(e) => {
                tracing::warn!(id, method = %method, error = %e, "host function did not complete");
                Err(StructuredError::with_message(format!(
                    "host function {} panicked",
                    method
                )))
            }
        };
        reply(&context, id, outcome);
    });
}

fn reply(context: &BridgeContext, id: CallId, outcome: Result<String, StructuredError>) {
    let script = match outcome {
        Ok(result) => script::resolve(id, &result),
        Err(error) => script::reject(id, &error),
    };
    if let Err(e) = context.transport.evaluate(script) {
        tracing::debug!(id, error = %e, "could not deliver host function outcome");
    }
}
