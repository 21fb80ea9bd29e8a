//! Transport error types

use thiserror::Error;

use crate::error::ErrorKind;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Opening the connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The compositor side is gone
    #[error("Connection lost")]
    Disconnected,

    /// Outbound event queue is full
    #[error("Outbound event queue is full")]
    QueueFull,

    /// Compositor refused the resize
    #[error("Resize to {0}x{1} refused")]
    ResizeRefused(u32, u32),

    /// Segment was not offered or has the wrong kind
    #[error("Segment unavailable: {0}")]
    SegmentUnavailable(String),

    /// Shared memory mapping failed
    #[error("Mapping failed: {0}")]
    Mapping(#[from] std::io::Error),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &TransportError) -> ErrorKind {
    match error {
        TransportError::ConnectionFailed(_) => ErrorKind::ConnectionUnavailable,
        TransportError::Disconnected | TransportError::SegmentUnavailable(_) => {
            ErrorKind::ProtocolInconsistent
        }
        TransportError::QueueFull => ErrorKind::ConnectionUnavailable,
        TransportError::ResizeRefused(_, _) => ErrorKind::ResizeRejected,
        TransportError::Mapping(_) => ErrorKind::OutOfMemory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            classify_error(&TransportError::Disconnected),
            ErrorKind::ProtocolInconsistent
        );
        assert_eq!(
            classify_error(&TransportError::ResizeRefused(10, 10)),
            ErrorKind::ResizeRejected
        );
        assert_eq!(
            classify_error(&TransportError::ConnectionFailed("no path".into())),
            ErrorKind::ConnectionUnavailable
        );
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::ResizeRefused(640, 480);
        assert_eq!(err.to_string(), "Resize to 640x480 refused");
    }
}
