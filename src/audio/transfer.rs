//! Audio ring transfer
//!
//! Copies a mix buffer into a segment's audio ring in chunks bounded by the
//! space left in the ring. A ring that becomes exactly full is signalled and
//! its used counter reset before the next chunk is copied.
//!
//! The caller must hold the connection lock for the whole call: a resize on
//! another thread may move or shrink the ring.

use tracing::trace;

use super::error::{AudioError, Result};
use crate::transport::{Segment, Signal};

/// Counters for one transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Chunks copied
    pub copies: usize,
    /// Audio signals raised
    pub signals: usize,
    /// Bytes copied
    pub bytes: usize,
}

impl std::ops::AddAssign for TransferStats {
    fn add_assign(&mut self, other: Self) {
        self.copies += other.copies;
        self.signals += other.signals;
        self.bytes += other.bytes;
    }
}

/// Copy `data` into the segment's audio ring, signalling whenever it fills
pub fn transfer(segment: &mut dyn Segment, mut data: &[u8]) -> Result<TransferStats> {
    let mut stats = TransferStats::default();

    while !data.is_empty() {
        let full = {
            let mut ring = segment.audio_ring();
            let capacity = ring.capacity();
            if capacity == 0 {
                return Err(AudioError::RingUnavailable);
            }
            let used = (*ring.used).min(capacity);
            let chunk = (capacity - used).min(data.len());
            if chunk > 0 {
                ring.buffer[used..used + chunk].copy_from_slice(&data[..chunk]);
                *ring.used = used + chunk;
                data = &data[chunk..];
                stats.copies += 1;
                stats.bytes += chunk;
            }
            *ring.used == capacity
        };

        if full {
            segment.signal(Signal::Audio)?;
            *segment.audio_ring().used = 0;
            stats.signals += 1;
        }
    }

    trace!(
        "Audio transfer: {} bytes in {} chunk(s), {} signal(s)",
        stats.bytes,
        stats.copies,
        stats.signals
    );
    Ok(stats)
}
