//! Registration Table
//!
//! Maps the dotted names the guest calls (e.g. `Host.add`) to host-side
//! implementations. An implementation takes the positional JSON argument
//! texts and produces the JSON text of its result, or a [`HostError`].
//!
//! Registering a name twice replaces the earlier entry.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use jsbridge_common::HostError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Result of a host function: JSON text or a failure.
pub type HostResult = std::result::Result<String, HostError>;

type SyncFn = dyn Fn(Vec<String>) -> HostResult + Send + Sync;
type AsyncFn = dyn Fn(Vec<String>) -> BoxFuture<'static, HostResult> + Send + Sync;

/// A host implementation reachable from the guest by name.
#[derive(Clone)]
pub enum HostFunction {
    /// Completes before returning.
    Sync(Arc<SyncFn>),
    /// Completes later; runs concurrently with other guest calls.
    Async(Arc<AsyncFn>),
}

impl HostFunction {
    /// Wraps a blocking implementation.
    ///
    /// # Arguments
    /// * `f` - Receives the JSON text of each positional argument and returns
    ///   the JSON text of the result. It runs on a tokio worker thread, so
    ///   it should not block for long.
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(Vec<String>) -> HostResult + Send + Sync + 'static,
    {
        HostFunction::Sync(Arc::new(f))
    }

    /// Wraps an implementation that completes later.
    ///
    /// # Arguments
    /// * `f` - Receives the JSON text of each positional argument. Awaiting
    ///   inside the future it returns does not hold up other guest calls.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HostResult> + Send + 'static,
    {
        HostFunction::Async(Arc::new(move |params| f(params).boxed()))
    }

    pub async fn invoke(&self, params: Vec<String>) -> HostResult {
        match self {
            HostFunction::Sync(f) => f(params),
            HostFunction::Async(f) => f(params).await,
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostFunction::Sync(_) => f.write_str("HostFunction::Sync"),
            HostFunction::Async(_) => f.write_str("HostFunction::Async"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistrationTable {
    functions: HashMap<String, HostFunction>,
    namespaces: BTreeSet<String>,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `function` under `name`, returning the entry it replaced.
    pub fn insert(&mut self, name: impl Into<String>, function: HostFunction) -> Option<HostFunction> {
        self.functions.insert(name.into(), function)
    }

    /// Records a namespace container. Returns `false` if it already existed.
    pub fn insert_namespace(&mut self, namespace: impl Into<String>) -> bool {
        self.namespaces.insert(namespace.into())
    }

    /// Looks up the implementation registered under `name`.
    ///
    /// # Returns
    /// A cheap clone of the entry, so it can be invoked after the table's
    /// lock is released; `None` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Option<HostFunction> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Registered function names, sorted. Namespaces are not included.
    ///
    /// # Example
    /// ```
    /// use jsbridge_host::registry::{HostFunction, RegistrationTable};
    ///
    /// let mut table = RegistrationTable::new();
    /// table.insert("Host.b", HostFunction::from_sync(|_| Ok("1".to_string())));
    /// table.insert("Host.a", HostFunction::from_sync(|_| Ok("2".to_string())));
    /// table.insert_namespace("Host.storage");
    ///
    /// assert!(table.get("Host.a").is_some());
    /// assert!(table.get("Host.c").is_none());
    /// assert_eq!(table.names(), vec!["Host.a", "Host.b"]);
    /// ```
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
