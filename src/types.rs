//! Identity types shared across the bridge
//!
//! Window ids belong to the host toolkit; segment ids and slot indices belong
//! to the connection.

use std::fmt;

/// Toolkit-side window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Toolkit window flags the bridge needs to honour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowFlags {
    /// Window accepts compositor-driven resizes (DISPLAYHINT)
    pub resizable: bool,
    /// Window starts hidden
    pub hidden: bool,
}

impl WindowFlags {
    /// Flags for a resizable, visible window
    pub fn resizable() -> Self {
        Self {
            resizable: true,
            hidden: false,
        }
    }
}

/// Index into the fixed secondary segment table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Create a slot index, `None` if out of range for the table
    pub fn new(index: usize) -> Option<Self> {
        if index < crate::registry::SEGMENT_CAPACITY {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Table position
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit in the free-slot mask
    pub fn bit(self) -> u8 {
        1u8 << self.0
    }

    /// Correlation tag used for segment requests bound to this slot
    pub fn tag(self) -> u32 {
        crate::registry::WINDOW_TAG_BASE + self.0 as u32
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// A segment owned by the shared connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentId {
    /// The primary segment
    Primary,
    /// A secondary (window) segment
    Slot(SlotIndex),
    /// The cursor segment
    Cursor,
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Primary => write!(f, "primary"),
            SegmentId::Slot(slot) => write!(f, "{}", slot),
            SegmentId::Cursor => write!(f, "cursor"),
        }
    }
}

/// Display rectangle reported to the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}
