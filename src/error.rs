//! Error classification
//!
//! Every module error maps onto one [`ErrorKind`] so the host toolkit can pick
//! a recovery strategy without matching on module-specific variants.

/// Error classification for recovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No compositor reachable or the connection attempt failed
    ConnectionUnavailable,
    /// Allocation failed
    OutOfMemory,
    /// The compositor refused a segment request
    SegmentRejected,
    /// The connection or protocol state is unusable
    ProtocolInconsistent,
    /// Feature exists in the protocol but the bridge does not act on it
    NotImplemented,
    /// The compositor refused a resize; the caller keeps the old size
    ResizeRejected,
    /// Caller passed an invalid argument or handle
    InvalidArgument,
}

impl ErrorKind {
    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionUnavailable | ErrorKind::SegmentRejected | ErrorKind::ResizeRejected
        )
    }

    /// Whether the shared connection should be considered lost
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::ProtocolInconsistent)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConnectionUnavailable => "connection unavailable",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::SegmentRejected => "segment rejected",
            ErrorKind::ProtocolInconsistent => "protocol inconsistent",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::ResizeRejected => "resize rejected",
            ErrorKind::InvalidArgument => "invalid argument",
        };
        f.write_str(name)
    }
}
