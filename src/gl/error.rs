//! GL bridge error types

use thiserror::Error;

use super::ContextHandle;
use crate::error::ErrorKind;
use crate::types::SegmentId;

/// Result type for GL bridge operations
pub type Result<T> = std::result::Result<T, GlError>;

/// GL bridge error types
#[derive(Error, Debug)]
pub enum GlError {
    /// GL library could not be loaded
    #[error("Failed to load GL library: {0}")]
    LibraryLoad(String),

    /// Accelerated setup or context creation failed
    #[error("Context creation failed: {0}")]
    ContextCreation(String),

    /// Segment is not mapped
    #[error("Unknown segment: {0}")]
    UnknownSegment(SegmentId),

    /// Handle does not name a live context
    #[error("Unknown context {0:?}")]
    UnknownContext(ContextHandle),

    /// Only the built-in context is allowed
    #[error("Additional contexts are disabled on {0}")]
    AdditionalContextsDisabled(SegmentId),

    /// Backend call failed
    #[error("GL backend error: {0}")]
    Backend(String),
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &GlError) -> ErrorKind {
    match error {
        GlError::LibraryLoad(_) | GlError::ContextCreation(_) => ErrorKind::ConnectionUnavailable,
        GlError::UnknownSegment(_) | GlError::UnknownContext(_) => ErrorKind::InvalidArgument,
        GlError::AdditionalContextsDisabled(_) => ErrorKind::NotImplemented,
        GlError::Backend(_) => ErrorKind::ProtocolInconsistent,
    }
}
