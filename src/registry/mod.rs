//! Secondary segment registry
//!
//! Toolkit windows beyond the first are backed by subsegments of the primary.
//! The registry owns them in a fixed table of [`SEGMENT_CAPACITY`] slots with
//! an occupancy bitmask. A slot's bit is set exactly when the slot holds a
//! mapped segment, and allocation always picks the lowest clear bit.
//!
//! Only one window request is in flight at a time. The request is answered
//! asynchronously by the compositor, so it is split into
//! [`begin_request`](SegmentRegistry::begin_request) and repeated
//! [`poll_request`](SegmentRegistry::poll_request) passes; callers release the
//! connection lock between passes.

pub mod error;
pub mod negotiation;

pub use error::{classify_error, Result, SegmentError};
pub use negotiation::{Negotiation, PendingQueue};

use tracing::{debug, error, info};

use crate::protocol::SegmentKind;
use crate::transport::Segment;
use crate::types::{SlotIndex, WindowFlags, WindowId};

/// Number of secondary slots
pub const SEGMENT_CAPACITY: usize = 8;

/// Base of window request tags; the slot index is added
pub const WINDOW_TAG_BASE: u32 = 0xA000;

/// Tag of cursor segment requests
pub const CURSOR_TAG: u32 = 0xC000;

/// A bound secondary segment
pub struct SlotEntry {
    pub(crate) segment: Box<dyn Segment>,
    pub(crate) window: WindowId,
    pub(crate) flags: WindowFlags,
}

impl SlotEntry {
    /// Window backed by this slot
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Window flags recorded at creation
    pub fn flags(&self) -> WindowFlags {
        self.flags
    }

    /// Segment dimensions
    pub fn size(&self) -> (u32, u32) {
        self.segment.size()
    }

    /// Borrow the segment
    pub fn segment_mut(&mut self) -> &mut dyn Segment {
        self.segment.as_mut()
    }
}

impl std::fmt::Debug for SlotEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotEntry")
            .field("window", &self.window)
            .field("flags", &self.flags)
            .field("size", &self.segment.size())
            .finish()
    }
}

#[derive(Debug)]
struct Outstanding {
    negotiation: Negotiation,
    slot: SlotIndex,
    window: WindowId,
    flags: WindowFlags,
}

/// Fixed-capacity table of secondary segments
#[derive(Debug)]
pub struct SegmentRegistry {
    slots: [Option<SlotEntry>; SEGMENT_CAPACITY],
    mask: u8,
    outstanding: Option<Outstanding>,
    poisoned: bool,
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            mask: 0,
            outstanding: None,
            poisoned: false,
        }
    }

    /// Occupancy bitmask, bit `i` set when slot `i` is bound
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Number of bound slots
    pub fn live(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Every slot is bound
    pub fn is_full(&self) -> bool {
        self.mask == u8::MAX
    }

    /// A negotiation failed in a way that left the connection unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Lowest unbound slot
    pub fn lowest_free(&self) -> Option<SlotIndex> {
        if self.is_full() {
            return None;
        }
        SlotIndex::new((!self.mask).trailing_zeros() as usize)
    }

    /// Slot and tag of the request in flight
    pub fn outstanding(&self) -> Option<(SlotIndex, u32)> {
        self.outstanding
            .as_ref()
            .map(|o| (o.slot, o.negotiation.tag()))
    }

    /// Send a window segment request for the lowest free slot
    ///
    /// The slot is only reserved; its bit is set once the segment is mapped.
    pub fn begin_request(
        &mut self,
        primary: &mut dyn Segment,
        width: u32,
        height: u32,
        window: WindowId,
        flags: WindowFlags,
    ) -> Result<SlotIndex> {
        if self.poisoned {
            return Err(SegmentError::ProtocolInconsistent(
                "registry disabled after a failed negotiation".to_string(),
            ));
        }
        if let Some(outstanding) = &self.outstanding {
            return Err(SegmentError::RequestInFlight(outstanding.negotiation.tag()));
        }
        let slot = self
            .lowest_free()
            .ok_or(SegmentError::OutOfSlots(SEGMENT_CAPACITY))?;

        let negotiation = Negotiation::send(
            primary,
            SegmentKind::Application,
            width,
            height,
            slot.tag(),
        )
        .inspect_err(|_| self.poisoned = true)?;

        self.outstanding = Some(Outstanding {
            negotiation,
            slot,
            window,
            flags,
        });
        Ok(slot)
    }

    /// Run one negotiation pass for the request in flight
    ///
    /// `Ok(None)` means no answer yet. Rejection frees the reservation; any
    /// other failure poisons the registry.
    pub fn poll_request(
        &mut self,
        primary: &mut dyn Segment,
        pending: &mut PendingQueue,
    ) -> Result<Option<SlotIndex>> {
        let mut outstanding = self
            .outstanding
            .take()
            .ok_or(SegmentError::NoRequestInFlight)?;

        match outstanding.negotiation.poll_pass(primary, pending) {
            Ok(None) => {
                self.outstanding = Some(outstanding);
                Ok(None)
            }
            Ok(Some(segment)) => {
                let slot = outstanding.slot;
                self.slots[slot.index()] = Some(SlotEntry {
                    segment,
                    window: outstanding.window,
                    flags: outstanding.flags,
                });
                self.mask |= slot.bit();
                info!(
                    "{} bound to {} (mask {:08b})",
                    outstanding.window, slot, self.mask
                );
                Ok(Some(slot))
            }
            Err(e @ SegmentError::SegmentRejected { .. }) => Err(e),
            Err(e) => {
                error!("Segment registry poisoned: {}", e);
                self.poisoned = true;
                Err(e)
            }
        }
    }

    /// Unbind a slot and hand back its entry
    pub fn release(&mut self, slot: SlotIndex) -> Result<SlotEntry> {
        let entry = self.slots[slot.index()]
            .take()
            .ok_or(SegmentError::UnknownSlot(slot))?;
        self.mask &= !slot.bit();
        debug!("{} released (mask {:08b})", slot, self.mask);
        Ok(entry)
    }

    /// Bound entry for a slot
    pub fn get(&self, slot: SlotIndex) -> Option<&SlotEntry> {
        self.slots[slot.index()].as_ref()
    }

    /// Bound entry for a slot
    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut SlotEntry> {
        self.slots[slot.index()].as_mut()
    }

    /// Slot backing a window
    pub fn find_window(&self, window: WindowId) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|entry| entry.as_ref().is_some_and(|e| e.window == window))
            .and_then(SlotIndex::new)
    }

    /// Bound entries in slot order
    pub fn live_mut(&mut self) -> impl Iterator<Item = (SlotIndex, &mut SlotEntry)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, entry)| Some((SlotIndex::new(index)?, entry.as_mut()?)))
    }

    /// Drop every bound segment and any request in flight
    pub fn clear(&mut self) -> usize {
        let released = self.live();
        for entry in self.slots.iter_mut() {
            *entry = None;
        }
        self.mask = 0;
        self.outstanding = None;
        released
    }
}
