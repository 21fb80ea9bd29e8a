//! Cursor error types

use thiserror::Error;

use crate::error::ErrorKind;
use crate::registry::SegmentError;
use crate::transport::TransportError;

/// Result type for cursor operations
pub type Result<T> = std::result::Result<T, CursorError>;

/// Cursor error types
#[derive(Error, Debug)]
pub enum CursorError {
    /// Pixel buffer does not match the bitmap size
    #[error("Cursor bitmap {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidBitmap {
        /// Bitmap width
        width: u32,
        /// Bitmap height
        height: u32,
        /// Required byte count
        expected: usize,
        /// Provided byte count
        actual: usize,
    },

    /// Bitmap cursor shown without a cursor segment
    #[error("No cursor segment mapped")]
    NoCursorSegment,

    /// Primary connection is gone
    #[error("Not connected")]
    NotConnected,

    /// Operation the protocol does not offer
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// Cursor segment negotiation failed
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &CursorError) -> ErrorKind {
    match error {
        CursorError::InvalidBitmap { .. } | CursorError::NoCursorSegment => {
            ErrorKind::InvalidArgument
        }
        CursorError::NotConnected => ErrorKind::ConnectionUnavailable,
        CursorError::Unsupported(_) => ErrorKind::NotImplemented,
        CursorError::Segment(e) => crate::registry::classify_error(e),
        CursorError::Transport(e) => crate::transport::classify_error(e),
    }
}
