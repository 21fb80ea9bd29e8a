//! Segment registry error types

use thiserror::Error;

use crate::error::ErrorKind;
use crate::types::SlotIndex;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, SegmentError>;

/// Segment registry error types
#[derive(Error, Debug)]
pub enum SegmentError {
    /// All secondary slots are in use
    #[error("All {0} segment slots are in use")]
    OutOfSlots(usize),

    /// Compositor answered with REQFAIL
    #[error("Segment request 0x{tag:04X} rejected by compositor")]
    SegmentRejected {
        /// Tag of the refused request
        tag: u32,
    },

    /// Connection died or answered inconsistently during negotiation
    #[error("Protocol inconsistent: {0}")]
    ProtocolInconsistent(String),

    /// Another window request is still waiting for an answer
    #[error("Segment request 0x{0:04X} still in flight")]
    RequestInFlight(u32),

    /// No window request is waiting for an answer
    #[error("No segment request in flight")]
    NoRequestInFlight,

    /// Slot is not bound
    #[error("Slot {0} is not bound")]
    UnknownSlot(SlotIndex),

    /// Shared connection has no primary segment
    #[error("Not connected")]
    NotConnected,
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &SegmentError) -> ErrorKind {
    match error {
        SegmentError::OutOfSlots(_) | SegmentError::SegmentRejected { .. } => {
            ErrorKind::SegmentRejected
        }
        SegmentError::ProtocolInconsistent(_) | SegmentError::NotConnected => {
            ErrorKind::ProtocolInconsistent
        }
        SegmentError::RequestInFlight(_)
        | SegmentError::NoRequestInFlight
        | SegmentError::UnknownSlot(_) => ErrorKind::InvalidArgument,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            classify_error(&SegmentError::OutOfSlots(8)),
            ErrorKind::SegmentRejected
        );
        assert_eq!(
            classify_error(&SegmentError::ProtocolInconsistent("gone".into())),
            ErrorKind::ProtocolInconsistent
        );
    }

    #[test]
    fn test_rejected_display() {
        let err = SegmentError::SegmentRejected { tag: 0xA001 };
        assert_eq!(err.to_string(), "Segment request 0xA001 rejected by compositor");
    }
}
