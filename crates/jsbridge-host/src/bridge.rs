//! Bridge Facade
//!
//! [`Bridge`] is the host's handle to one guest environment. It owns the
//! shared `BridgeContext`: the transport, the readiness gate, the
//! pending-call table and the registration table. A background dispatch task
//! holds only a weak reference to it, so the last `Bridge` clone to go away
//! tears the guest down.
//!
//! # Call Flow
//!
//! 1. Wait for the readiness gate
//! 2. Park a slot in the correlator under a fresh identifier
//! 3. Ask the guest runtime to invoke the function under that identifier
//! 4. Await the slot; the dispatch task settles it when the response arrives
//!
//! # Errors
//!
//! Every operation fails with the sticky initialization error once
//! initialization has failed, and with the teardown error after
//! [`Bridge::close`] or a transport termination.

use jsbridge_common::{script, BridgeError, InitializationError, Result, Transport, TransportEvents};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::BridgeConfig;
use crate::correlator::Correlator;
use crate::dispatch;
use crate::readiness::{ReadinessGate, ReadinessState};
use crate::registry::{HostFunction, RegistrationTable};

/// The single embedded execution environment plus its correlation state.
///
/// All mutation of the pending-call table and the registration table goes
/// through the locks below, so the bridge may be shared across threads.
pub(crate) struct BridgeContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: BridgeConfig,
    pub(crate) gate: ReadinessGate,
    correlator: Mutex<Correlator>,
    registry: RwLock<RegistrationTable>,
    library: Mutex<Option<String>>,
}

impl BridgeContext {
    pub(crate) fn correlator(&self) -> MutexGuard<'_, Correlator> {
        self.correlator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, RegistrationTable> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, RegistrationTable> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out the library source; it is booted exactly once.
    pub(crate) fn take_library(&self) -> Option<String> {
        self.library.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Rejects every outstanding call, refuses new ones, fails a gate that
    /// is still initializing and closes the transport.
    pub(crate) fn shutdown(&self, error: BridgeError) {
        let cancelled = self.correlator().close(error.clone());
        self.gate.fail(error.clone());
        self.transport.close();
        tracing::info!(cancelled, reason = %error, "bridge torn down");
    }
}

impl Drop for BridgeContext {
    fn drop(&mut self) {
        if !self.correlator().is_closed() {
            self.shutdown(BridgeError::Closed);
        }
    }
}

/// Host handle to a JavaScript library running in an embedded guest
/// environment.
///
/// Cloning is cheap; all clones share one context. The environment is torn
/// down by [`close`](Self::close) or when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// let (transport, events) = jsbridge_boa::BoaTransport::spawn()?;
/// let bridge = Bridge::new(transport, events, "function add(a, b) { return a + b; }", BridgeConfig::default());
///
/// let sum: i64 = bridge.call("add", (1, 2)).await?;
/// assert_eq!(sum, 3);
/// ```
#[derive(Clone)]
pub struct Bridge {
    context: Arc<BridgeContext>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge over `transport` and starts initialization.
    ///
    /// Returns immediately. The page is loaded, the interop runtime injected
    /// and `library_source` executed in the background; every operation
    /// waits for that to finish first. A failure at any step makes every
    /// operation on this bridge fail with the same error.
    ///
    /// Must be called from within a Tokio runtime; outside one, the bridge
    /// fails initialization.
    pub fn new<T>(
        transport: T,
        events: TransportEvents,
        library_source: impl Into<String>,
        config: BridgeConfig,
    ) -> Self
    where
        T: Transport + 'static,
    {
        let page = config.page();
        let context = Arc::new(BridgeContext {
            transport: Arc::new(transport),
            config,
            gate: ReadinessGate::new(),
            correlator: Mutex::new(Correlator::new()),
            registry: RwLock::new(RegistrationTable::new()),
            library: Mutex::new(Some(library_source.into())),
        });

        context.gate.advance(ReadinessState::AwaitingTransportLoad);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(dispatch::run(Arc::downgrade(&context), events));
            }
            Err(e) => {
                context.gate.fail(BridgeError::Transport(format!("no async runtime: {}", e)));
                return Self { context };
            }
        }

        tracing::debug!(origin = %page.origin, incognito = page.incognito, "loading guest page");
        if let Err(e) = context.transport.load(&page) {
            context.gate.fail(InitializationError::TransportLoad(e.to_string()).into());
        }

        Self { context }
    }

    /// Waits until the guest environment is ready.
    ///
    /// # Errors
    ///
    /// Returns the initialization error if loading the page or running the
    /// library failed, or the teardown error if the bridge was closed first.
    pub async fn ready(&self) -> Result<()> {
        self.context.gate.wait().await
    }

    /// Current state of initialization.
    pub fn state(&self) -> ReadinessState {
        self.context.gate.state()
    }

    /// Calls a guest function with pre-serialized JSON arguments and returns
    /// the raw JSON text of its result.
    ///
    /// `function` is either a dotted path to a function defined in the guest
    /// (`"Namespace.method"`) or an inline function expression
    /// (`"(a, b) => a + b"`). It is evaluated fresh on every call. A result of
    /// `undefined` arrives as `null`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Guest`] if the function threw or rejected, including
    ///   a `ReferenceError` for names the guest does not define
    /// - [`BridgeError::InvalidArgument`] if a fragment is not valid JSON
    /// - [`BridgeError::Terminated`] / [`BridgeError::Closed`] if the bridge
    ///   was torn down before the call settled
    /// - the initialization error if the bridge never became ready
    ///
    /// # Cancellation
    ///
    /// Dropping the returned future frees the call's slot; a late response
    /// for it is ignored.
    pub async fn call_raw(&self, function: &str, args: Vec<String>) -> Result<String> {
        self.context.gate.wait().await?;
        script::validate_arguments(&args)?;

        let context = Arc::downgrade(&self.context);
        let pending = self.context.correlator().begin_call()?.on_abandon(move |id| {
            let Some(context) = context.upgrade() else {
                return;
            };
            if context.correlator().abandon(id) {
                tracing::debug!(id, "released slot of abandoned call");
            }
        });
        let id = pending.id();

        // Dropping `pending` on any early return frees the slot.
        tracing::debug!(id, function, arguments = args.len(), "calling guest function");
        self.context.transport.evaluate(script::invoke(id, function, &args))?;

        pending.wait().await
    }

    /// Exposes `function` to the guest under the dotted path `name`.
    ///
    /// Intermediate containers are created as needed. Registering a name
    /// again replaces the earlier implementation.
    pub async fn register(&self, name: &str, function: HostFunction) -> Result<()> {
        self.context.gate.wait().await?;
        script::validate_name(name)?;

        let replaced = self.context.registry_mut().insert(name, function);
        if replaced.is_some() {
            tracing::debug!(name, "replaced host function");
        } else {
            tracing::debug!(name, "registered host function");
        }

        self.context.transport.evaluate(script::expose(name))
    }

    /// Pre-creates an empty container at the dotted path `namespace`.
    pub async fn register_namespace(&self, namespace: &str) -> Result<()> {
        self.context.gate.wait().await?;
        script::validate_name(namespace)?;

        self.context.registry_mut().insert_namespace(namespace);
        self.context.transport.evaluate(script::namespace(namespace))
    }

    /// Names of all registered host functions, sorted.
    pub fn registered(&self) -> Vec<String> {
        self.context.registry().names()
    }

    /// Number of host → guest calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.context.correlator().len()
    }

    /// Tears the bridge down.
    ///
    /// Every outstanding call is rejected with [`BridgeError::Closed`] and
    /// every later operation fails with it.
    pub fn close(&self) {
        self.context.shutdown(BridgeError::Closed);
    }
}
