//! Toolkit-side events
//!
//! What the translator hands to the host toolkit's event queue.

use crate::types::WindowId;

/// Toolkit scancode (USB HID usage id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scancode(pub u32);

impl Scancode {
    /// No mapping exists for the platform key
    pub const UNKNOWN: Scancode = Scancode(0);
}

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Middle button
    Middle,
}

/// Window state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Close requested by the compositor
    Close,
    /// Window was resized by the compositor
    Resized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
}

/// Event for the host toolkit
///
/// `window` is `None` when the source segment is not bound to a toolkit
/// window yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitEvent {
    /// Pointer motion
    MouseMotion {
        /// Target window
        window: Option<WindowId>,
        /// Source device
        device: u16,
        /// `x`/`y` are deltas
        relative: bool,
        /// Horizontal position or delta
        x: i32,
        /// Vertical position or delta
        y: i32,
    },
    /// Button press or release
    MouseButton {
        /// Target window
        window: Option<WindowId>,
        /// Source device
        device: u16,
        /// Button
        button: MouseButton,
        /// Pressed
        pressed: bool,
    },
    /// Wheel tick
    MouseWheel {
        /// Target window
        window: Option<WindowId>,
        /// Source device
        device: u16,
        /// Horizontal ticks
        x: i32,
        /// Vertical ticks, negative is up
        y: i32,
    },
    /// Key press or release
    Key {
        /// Target window
        window: Option<WindowId>,
        /// Pressed
        pressed: bool,
        /// Translated scancode
        scancode: Scancode,
    },
    /// Text produced by a key press
    TextInput {
        /// Target window
        window: Option<WindowId>,
        /// UTF-8 text
        text: String,
    },
    /// Window state change
    Window {
        /// Target window
        window: WindowId,
        /// Change
        event: WindowEvent,
    },
}
