//! Protocol events
//!
//! Inbound events ([`Event`]) arrive on a segment's event queue. Outbound
//! requests ([`ExternalEvent`]) are enqueued by the client.

use enumflags2::{bitflags, BitFlags};

use super::{mouse_axis, SegmentKind};

/// Inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Input sample
    Io(IoEvent),
    /// Compositor command
    Target(TargetCommand),
}

/// Input device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Pointer device
    Mouse,
    /// Keyboard
    Keyboard,
    /// Touch surface
    Touch,
    /// Game controller
    Game,
}

/// Input sample routed to a segment
#[derive(Debug, Clone, PartialEq)]
pub struct IoEvent {
    /// Device identifier assigned by the compositor
    pub device: u16,
    /// Sub-identifier (axis or button index)
    pub subid: u16,
    /// Device class
    pub kind: DeviceKind,
    /// Payload
    pub input: InputData,
}

/// Input payload
#[derive(Debug, Clone, PartialEq)]
pub enum InputData {
    /// Axis sample
    Analog(AnalogInput),
    /// Button state
    Digital(DigitalInput),
    /// Keyboard key with optional text
    Translated(TranslatedInput),
    /// Touch point
    Touch(TouchInput),
}

/// Axis sample
///
/// `axes` carries two representations per axis: `[x, x_alt, y, y_alt]`.
/// The primary value is relative when `relative` is set; the alternate value
/// is the other representation when the compositor provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogInput {
    /// Primary values are relative deltas
    pub relative: bool,
    /// Axis values
    pub axes: [i16; 4],
}

/// Button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalInput {
    /// Pressed
    pub active: bool,
}

/// Keyboard key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatedInput {
    /// Pressed
    pub active: bool,
    /// Platform scancode
    pub scancode: u8,
    /// Keysym
    pub keysym: u32,
    /// Modifier mask
    pub modifiers: u16,
    /// NUL-padded UTF-8 text
    pub utf8: [u8; 5],
}

impl TranslatedInput {
    /// Text carried by the key, `None` when empty or not valid UTF-8
    pub fn text(&self) -> Option<&str> {
        let len = self.utf8.iter().position(|b| *b == 0).unwrap_or(self.utf8.len());
        if len == 0 {
            return None;
        }
        std::str::from_utf8(&self.utf8[..len]).ok()
    }
}

/// Touch point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchInput {
    /// Contact present
    pub active: bool,
    /// Horizontal position
    pub x: i16,
    /// Vertical position
    pub y: i16,
    /// Contact pressure
    pub pressure: f32,
}

impl IoEvent {
    /// Single-axis mouse sample; `axis` is [`mouse_axis::X`] or [`mouse_axis::Y`]
    pub fn mouse_axis(device: u16, axis: u16, relative: bool, value: i16) -> Self {
        Self {
            device,
            subid: axis,
            kind: DeviceKind::Mouse,
            input: InputData::Analog(AnalogInput {
                relative,
                axes: [value, 0, 0, 0],
            }),
        }
    }

    /// Two-axis mouse sample
    pub fn mouse_merged(device: u16, relative: bool, x: i16, y: i16) -> Self {
        Self {
            device,
            subid: mouse_axis::MERGED,
            kind: DeviceKind::Mouse,
            input: InputData::Analog(AnalogInput {
                relative,
                axes: [x, 0, y, 0],
            }),
        }
    }

    /// Mouse button sample
    pub fn mouse_button(device: u16, index: u16, active: bool) -> Self {
        Self {
            device,
            subid: index,
            kind: DeviceKind::Mouse,
            input: InputData::Digital(DigitalInput { active }),
        }
    }

    /// Keyboard sample; text longer than four bytes is dropped
    pub fn key(device: u16, scancode: u8, active: bool, text: &str) -> Self {
        let mut utf8 = [0u8; 5];
        if text.len() < utf8.len() {
            utf8[..text.len()].copy_from_slice(text.as_bytes());
        }
        Self {
            device,
            subid: scancode as u16,
            kind: DeviceKind::Keyboard,
            input: InputData::Translated(TranslatedInput {
                active,
                scancode,
                keysym: 0,
                modifiers: 0,
                utf8,
            }),
        }
    }
}

/// Focus and visibility bit carried by a display hint
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayHintFlag {
    /// Segment is not visible
    Invisible = 0b0000_0010,
    /// Segment lost input focus
    Unfocused = 0b0000_0100,
    /// State bits are not set and must be ignored
    Ignore = 0b1000_0000,
}

/// Display hint state bits
pub type DisplayHintFlags = BitFlags<DisplayHintFlag>;

/// Decode the raw hint byte, dropping bits without a meaning here
pub fn display_hint_flags(raw: u8) -> DisplayHintFlags {
    BitFlags::from_bits_truncate(raw)
}

/// Reset severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLevel {
    /// Return to initial state
    Soft,
    /// Full state reset
    Hard,
    /// Compositor recovered from a crash, GPU state lost
    Recovery,
    /// Connection migrated to another compositor
    Migrated,
    /// Unrecognised level
    Other(i32),
}

impl ResetLevel {
    /// Map a raw reset level
    pub fn from_raw(level: i32) -> Self {
        match level {
            0 => ResetLevel::Soft,
            1 => ResetLevel::Hard,
            2 => ResetLevel::Recovery,
            3 => ResetLevel::Migrated,
            other => ResetLevel::Other(other),
        }
    }
}

/// Compositor command
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCommand {
    /// Segment should close
    Exit,
    /// Suggested segment size and state
    DisplayHint {
        /// Width, 0 for unchanged
        width: u32,
        /// Height, 0 for unchanged
        height: u32,
        /// Focus and visibility bits
        flags: DisplayHintFlags,
    },
    /// Output display properties
    OutputHint {
        /// Display width
        width: u32,
        /// Display height
        height: u32,
        /// Refresh rate in Hz
        rate: u32,
    },
    /// Reset request
    Reset(ResetLevel),
    /// A requested (or pushed) segment is ready to be mapped
    NewSegment {
        /// Kind of the new segment
        kind: SegmentKind,
        /// Tag of the originating request, 0 for pushed segments
        tag: u32,
    },
    /// A segment request was refused
    RequestFailed {
        /// Tag of the refused request
        tag: u32,
    },
    /// Binary chunk offered to the client
    BChunkIn,
    /// Frame step request
    StepFrame,
    /// Font preference hint
    FontHint,
    /// Audio gain hint
    Attenuate,
    /// Device node handover
    DeviceNode,
}

/// Client-originated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalEvent {
    /// Ask for a new subsegment
    SegmentRequest {
        /// Requested kind
        kind: SegmentKind,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Correlation tag echoed by the response
        tag: u32,
    },
    /// Segment title
    Ident(String),
    /// Cursor label ("default", "hidden", "hidden-rel", ...)
    CursorHint(String),
    /// Absolute cursor position
    CursorInput {
        /// Horizontal position
        x: i32,
        /// Vertical position
        y: i32,
    },
    /// Visibility hint
    ViewportHint {
        /// Segment should not be shown
        invisible: bool,
    },
}
