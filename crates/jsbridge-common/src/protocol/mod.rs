pub mod error;
pub mod message;
pub mod script;
pub mod structured;


pub use error::{BridgeError, InitializationError, Result};
pub use message::{CallId, GuestMessage, INIT_CALL_ID};
pub use structured::{HostError, StructuredError};
