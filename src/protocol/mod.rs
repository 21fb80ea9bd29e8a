//! Segment protocol model
//!
//! Typed view of the compositor shared-memory protocol as seen by a client.
//! The wire format lives behind [`crate::transport::Segment`]; everything above
//! the transport only deals in these types.
//!
//! # Event categories
//!
//! - **IO**: input samples routed to the client (mouse, keyboard, touch, game)
//! - **TARGET**: compositor commands (exit, resize hints, new segments, ...)
//! - **EXTERNAL**: client-originated requests ([`ExternalEvent`])
//!
//! # Audio format
//!
//! Audio is fixed at interleaved stereo, signed 16-bit little-endian,
//! 48 kHz. There is no negotiation.

pub mod event;

pub use event::{
    display_hint_flags, AnalogInput, DeviceKind, DigitalInput, DisplayHintFlag, DisplayHintFlags,
    Event, ExternalEvent, InputData, IoEvent, ResetLevel, TargetCommand, TouchInput,
    TranslatedInput,
};

/// Audio channel count
pub const AUDIO_CHANNELS: u16 = 2;

/// Audio sample rate in Hz
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Bytes per sample per channel (s16le)
pub const AUDIO_SAMPLE_BYTES: usize = 2;

/// Bytes per interleaved frame
pub const AUDIO_FRAME_BYTES: usize = AUDIO_CHANNELS as usize * AUDIO_SAMPLE_BYTES;

/// Largest text payload carried by IDENT and cursor hint messages
pub const MESSAGE_CAPACITY: usize = 77;

/// Bytes per video pixel (RGBA8888)
pub const VIDEO_PIXEL_BYTES: usize = 4;

/// Digital mouse input indices
pub mod mouse_button {
    /// Primary button
    pub const LEFT: u16 = 1;
    /// Secondary button
    pub const RIGHT: u16 = 2;
    /// Middle button
    pub const MIDDLE: u16 = 3;
    /// Wheel step upwards
    pub const WHEEL_UP: u16 = 4;
    /// Wheel step downwards
    pub const WHEEL_DOWN: u16 = 5;
}

/// Analog mouse sub-identifiers
pub mod mouse_axis {
    /// Horizontal axis only
    pub const X: u16 = 0;
    /// Vertical axis only
    pub const Y: u16 = 1;
    /// Both axes in one sample
    pub const MERGED: u16 = 2;
}

/// Segment kinds the client requests or receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Generic application window
    Application,
    /// Game window, preferred for toolkit primaries
    Game,
    /// Mouse cursor image
    Cursor,
    /// Popup surface
    Popup,
    /// Outbound clipboard
    Clipboard,
    /// Inbound clipboard
    ClipboardPaste,
    /// Audio-only media
    Media,
}

impl SegmentKind {
    /// Parse a segment kind from its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "application" => Some(SegmentKind::Application),
            "game" => Some(SegmentKind::Game),
            "cursor" => Some(SegmentKind::Cursor),
            "popup" => Some(SegmentKind::Popup),
            "clipboard" => Some(SegmentKind::Clipboard),
            "clipboard-paste" => Some(SegmentKind::ClipboardPaste),
            "media" => Some(SegmentKind::Media),
            _ => None,
        }
    }

    /// Configuration name
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Application => "application",
            SegmentKind::Game => "game",
            SegmentKind::Cursor => "cursor",
            SegmentKind::Popup => "popup",
            SegmentKind::Clipboard => "clipboard",
            SegmentKind::ClipboardPaste => "clipboard-paste",
            SegmentKind::Media => "media",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate a message to [`MESSAGE_CAPACITY`] bytes on a char boundary
pub fn clamp_message(text: &str) -> &str {
    if text.len() <= MESSAGE_CAPACITY {
        return text;
    }
    let mut end = MESSAGE_CAPACITY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
