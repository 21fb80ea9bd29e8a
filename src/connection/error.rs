//! Connection bootstrap error types

use thiserror::Error;

use crate::error::ErrorKind;
use crate::transport::TransportError;

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Connection bootstrap error types
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Compositor not reachable
    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// Allocation for the shared state failed
    #[error("Out of memory while attaching to the connection")]
    OutOfMemory,

    /// Shared state exists but is unusable
    #[error("Protocol inconsistent: {0}")]
    ProtocolInconsistent(String),

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &ConnectError) -> ErrorKind {
    match error {
        ConnectError::ConnectionUnavailable(_) => ErrorKind::ConnectionUnavailable,
        ConnectError::OutOfMemory => ErrorKind::OutOfMemory,
        ConnectError::ProtocolInconsistent(_) => ErrorKind::ProtocolInconsistent,
        ConnectError::Transport(e) => crate::transport::classify_error(e),
    }
}
