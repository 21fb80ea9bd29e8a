//! Video device error types

use thiserror::Error;

use crate::connection::ConnectError;
use crate::cursor::CursorError;
use crate::error::ErrorKind;
use crate::gl::GlError;
use crate::registry::SegmentError;
use crate::transport::TransportError;
use crate::types::WindowId;

/// Result type for video device operations
pub type Result<T> = std::result::Result<T, VideoError>;

/// Video device error types
#[derive(Error, Debug)]
pub enum VideoError {
    /// Connection environment is not set
    #[error("Video driver unavailable: {0} is not set")]
    EnvironmentMissing(String),

    /// Window id has no segment
    #[error("Unknown window {0}")]
    UnknownWindow(WindowId),

    /// Window id already has a segment
    #[error("Window {0} already exists")]
    WindowExists(WindowId),

    /// Compositor refused a resize; the window keeps its size
    #[error("Resize of {window} to {width}x{height} rejected")]
    ResizeRejected {
        /// Window being resized
        window: WindowId,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Primary connection is gone
    #[error("Not connected")]
    NotConnected,

    /// Attaching to the shared connection failed
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// Window segment negotiation failed
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    /// GL bridge failure
    #[error("GL error: {0}")]
    Gl(#[from] GlError),

    /// Cursor failure
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &VideoError) -> ErrorKind {
    match error {
        VideoError::EnvironmentMissing(_) | VideoError::NotConnected => {
            ErrorKind::ConnectionUnavailable
        }
        VideoError::UnknownWindow(_) | VideoError::WindowExists(_) => ErrorKind::InvalidArgument,
        VideoError::ResizeRejected { .. } => ErrorKind::ResizeRejected,
        VideoError::Connect(e) => crate::connection::classify_error(e),
        VideoError::Segment(e) => crate::registry::classify_error(e),
        VideoError::Gl(e) => crate::gl::classify_error(e),
        VideoError::Cursor(e) => crate::cursor::classify_error(e),
        VideoError::Transport(e) => crate::transport::classify_error(e),
    }
}
