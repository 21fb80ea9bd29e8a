//! Segment transport
//!
//! [`Segment`] is the seam between the bridge and the shared-memory
//! connection library. One value represents one mapped segment: its event
//! queues, its video buffer and its audio ring. [`Connector`] opens the
//! primary segment.
//!
//! [`loopback`] provides an in-process compositor used by the probe binary and
//! the test suite.
//!
//! # Thread safety
//!
//! Segments are `Send` but not `Sync`. All access goes through the shared
//! connection mutex, which is what keeps audio transfers and resizes from
//! racing on the ring base address.

pub mod error;
pub mod loopback;

pub use error::{classify_error, Result, TransportError};

use crate::protocol::{Event, ExternalEvent, SegmentKind};

/// Synchronization point to raise on a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Video buffer contents are ready
    Video,
    /// Audio ring contents are ready
    Audio,
}

/// Buffer layout hints sent alongside an extended resize
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferHints {
    /// Size of one audio buffer in bytes
    pub audio_buffer_size: Option<usize>,
    /// Number of audio buffers
    pub audio_buffer_count: Option<usize>,
    /// Number of video buffers
    pub video_buffer_count: Option<usize>,
}

/// Mutable view of a segment's audio ring
///
/// The view borrows the segment, so a resize (which may move the ring) can
/// not happen while it is alive.
#[derive(Debug)]
pub struct AudioRing<'a> {
    /// Ring memory; its length is the capacity
    pub buffer: &'a mut [u8],
    /// Bytes written since the last audio signal
    pub used: &'a mut usize,
}

impl AudioRing<'_> {
    /// Ring capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes left before the ring must be signalled
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(*self.used)
    }
}

/// A mapped segment
pub trait Segment: Send {
    /// Segment kind
    fn kind(&self) -> SegmentKind;

    /// Current video dimensions
    fn size(&self) -> (u32, u32);

    /// Non-blocking event poll; `Ok(None)` when the queue is empty
    fn poll(&mut self) -> Result<Option<Event>>;

    /// Queue an outbound event
    fn enqueue(&mut self, event: ExternalEvent) -> Result<()>;

    /// Resize the video buffer
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Resize with buffer layout hints; may relocate the audio ring
    fn resize_ext(&mut self, width: u32, height: u32, hints: BufferHints) -> Result<()>;

    /// Borrow the audio ring
    fn audio_ring(&mut self) -> AudioRing<'_>;

    /// Borrow the video buffer (RGBA8888, row-major)
    fn video_buffer(&mut self) -> &mut [u8];

    /// Raise a synchronization signal
    fn signal(&mut self, signal: Signal) -> Result<()>;

    /// Map the subsegment announced by the last NEWSEGMENT event
    fn accept(&mut self, kind: SegmentKind) -> Result<Box<dyn Segment>>;
}

/// Opens primary segments
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Connect and map the primary segment
    fn open_primary(&self, kind: SegmentKind) -> Result<Box<dyn Segment>>;
}
