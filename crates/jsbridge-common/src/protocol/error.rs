use thiserror::Error;

use super::structured::StructuredError;

/// Failure while bringing a bridge to its ready state.
///
/// Initialization runs exactly once per bridge. Once it fails the error is
/// sticky: every later operation on the same bridge reports this value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitializationError {
    #[error("transport failed to load: {0}")]
    TransportLoad(String),

    #[error("library source threw during setup: {0}")]
    LibraryThrew(StructuredError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Bridge initialization failed: {0}")]
    Initialization(InitializationError),

    #[error("Guest error: {0}")]
    Guest(StructuredError),

    #[error("Transport terminated: {0}")]
    Terminated(String),

    #[error("Bridge closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid argument at position {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// The guest-side failure carried by this error, if there is one.
    ///
    /// Covers both a rejected call and a library that threw while loading.
    pub fn structured(&self) -> Option<&StructuredError> {
        match self {
            BridgeError::Guest(error)
            | BridgeError::Initialization(InitializationError::LibraryThrew(error)) => Some(error),
            _ => None,
        }
    }
}

impl From<InitializationError> for BridgeError {
    fn from(err: InitializationError) -> Self {
        BridgeError::Initialization(err)
    }
}

// serde_json::Error is not Clone, and BridgeError must be.
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
