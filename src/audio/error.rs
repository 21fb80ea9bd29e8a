//! Audio error types

use thiserror::Error;

use crate::connection::ConnectError;
use crate::error::ErrorKind;
use crate::transport::TransportError;

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// Connection environment is not set
    #[error("Audio output unavailable: {0} is not set")]
    EnvironmentMissing(String),

    /// Capture devices are not provided
    #[error("Audio capture is not supported")]
    CaptureUnsupported,

    /// Mix buffer allocation failed
    #[error("Out of memory allocating {0} byte mix buffer")]
    OutOfMemory(usize),

    /// Segment has no audio ring mapped
    #[error("Audio ring unavailable")]
    RingUnavailable,

    /// Attaching to the shared connection failed
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// Transport failure while signalling
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &AudioError) -> ErrorKind {
    match error {
        AudioError::EnvironmentMissing(_) => ErrorKind::ConnectionUnavailable,
        AudioError::CaptureUnsupported => ErrorKind::NotImplemented,
        AudioError::OutOfMemory(_) => ErrorKind::OutOfMemory,
        AudioError::RingUnavailable => ErrorKind::ProtocolInconsistent,
        AudioError::Connect(e) => crate::connection::classify_error(e),
        AudioError::Transport(e) => crate::transport::classify_error(e),
    }
}
