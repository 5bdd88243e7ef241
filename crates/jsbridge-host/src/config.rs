//! Bridge Configuration
//!
//! Options fixed when a [`Bridge`](crate::Bridge) is created. They decide
//! which page the guest loads and how guest calls to unregistered host
//! functions are answered.

use jsbridge_common::{PageRequest, DEFAULT_ORIGIN};

/// What to do when the guest calls a name nothing is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnregisteredMethodPolicy {
    /// Reply with a `ReferenceError` rejection so the guest caller settles.
    #[default]
    Reject,
    /// Drop the message without replying; the guest caller never settles.
    Drop,
}

/// Bridge configuration.
///
/// # Default Configuration
///
/// - `origin`: `None` (the page is served from `http://localhost`)
/// - `incognito`: `false`
/// - `unregistered_method`: [`UnregisteredMethodPolicy::Reject`]
///
/// # Example
///
/// ```
/// use jsbridge_host::{BridgeConfig, UnregisteredMethodPolicy};
///
/// let config = BridgeConfig::default()
///     .with_origin("https://example.com")
///     .with_incognito(true)
///     .with_unregistered_method(UnregisteredMethodPolicy::Drop);
/// assert_eq!(config.page().origin, "https://example.com");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Origin override for the guest page
    pub origin: Option<String>,
    /// Use non-persistent storage in the guest page
    pub incognito: bool,
    /// Handling of guest calls to unregistered host functions
    pub unregistered_method: UnregisteredMethodPolicy,
}

impl BridgeConfig {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_incognito(mut self, incognito: bool) -> Self {
        self.incognito = incognito;
        self
    }

    pub fn with_unregistered_method(mut self, policy: UnregisteredMethodPolicy) -> Self {
        self.unregistered_method = policy;
        self
    }

    /// The page the transport is asked to load.
    pub fn page(&self) -> PageRequest {
        PageRequest {
            origin: self
                .origin
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            incognito: self.incognito,
        }
    }
}
