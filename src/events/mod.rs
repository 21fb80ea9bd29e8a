//! Event translation
//!
//! Converts the protocol's IO and TARGET events into toolkit events.
//!
//! # Architecture
//!
//! ```text
//! segment queues ──> EventTranslator ──> Vec<ToolkitEvent>
//!                      ├─> mouse:    split-axis aggregation, buttons, wheel
//!                      ├─> keyboard: evdev keycode -> HID scancode
//!                      └─> target:   exit, display/output hints, resize
//! ```

pub mod keyboard;
pub mod mouse;
pub mod toolkit;
pub mod translator;

pub use keyboard::{Keymap, KeymapKind};
pub use mouse::MouseAggregation;
pub use toolkit::{MouseButton, Scancode, ToolkitEvent, WindowEvent};
pub use translator::{EventTranslator, Phase, PumpOutcome, Unhandled};
