//! jsbridge on Boa
//!
//! This crate provides an embedded guest environment for
//! [`jsbridge_host::Bridge`] built on the Boa JavaScript engine. Each
//! transport owns one Boa context on its own thread. The page it loads
//! offers `window`, `location`, `console`, `queueMicrotask` and a
//! `localStorage` that persists per origin to a [`DataStore`] unless the
//! bridge is incognito.
//!
//! # Example
//!
//! ```ignore
//! use jsbridge_host::BridgeConfig;
//!
//! let bridge = jsbridge_boa::launch("function add(a, b) { return a + b; }", BridgeConfig::default())?;
//! bridge.register_fn("Host.increment", |(n,): (i64,)| Ok(n + 1)).await?;
//!
//! let sum: i64 = bridge.call("add", (1, 2)).await?;
//! let next: i64 = bridge.call("async () => await Host.increment(41)", ()).await?;
//! ```
//!
//! Library sources are evaluated as eval code: top-level `var` and function
//! declarations become globals, `let`/`const`/`class` declarations do not.

mod engine;
pub mod storage;
pub mod transport;

pub use storage::DataStore;
pub use transport::BoaTransport;

use jsbridge_host::{Bridge, BridgeConfig, BridgeError, Result};
use std::path::Path;

/// Starts a bridge running `library` with its own page storage.
///
/// Must be called from within a Tokio runtime.
pub fn launch(library: impl Into<String>, config: BridgeConfig) -> Result<Bridge> {
    launch_with_store(library, config, DataStore::new())
}

/// Starts a bridge running `library` whose page storage lives in `store`.
pub fn launch_with_store(
    library: impl Into<String>,
    config: BridgeConfig,
    store: DataStore,
) -> Result<Bridge> {
    let (transport, events) = BoaTransport::spawn_with_store(store)?;
    Ok(Bridge::new(transport, events, library, config))
}

/// Starts a bridge running the library read from `path`.
pub fn launch_file(path: impl AsRef<Path>, config: BridgeConfig) -> Result<Bridge> {
    let path = path.as_ref();
    let library = std::fs::read_to_string(path).map_err(|e| {
        BridgeError::Transport(format!("failed to load library {}: {}", path.display(), e))
    })?;
    tracing::debug!(path = %path.display(), "loaded library source");
    launch(library, config)
}
