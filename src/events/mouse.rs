//! Mouse aggregation
//!
//! Split-axis analog samples arrive one axis at a time. They are folded into
//! a single pending motion which is flushed before the next button event and
//! at the end of every poll cycle, so the toolkit never sees half a motion.

use tracing::trace;

use super::toolkit::{MouseButton, ToolkitEvent};
use crate::protocol::{mouse_button, AnalogInput};
use crate::types::WindowId;

/// Axis of a split sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal
    X,
    /// Vertical
    Y,
}

/// Offset into [`AnalogInput::axes`] for the representation the toolkit wants
///
/// `0` picks the primary value when its mode matches the toolkit's relative
/// mode, `1` picks the alternate one otherwise.
pub fn axis_base(relative_mode: bool, sample: &AnalogInput) -> usize {
    if relative_mode == sample.relative {
        0
    } else {
        1
    }
}

/// Pending motion for the current poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MouseAggregation {
    x: i32,
    y: i32,
    relative: bool,
    dirty: bool,
    device: u16,
    window: Option<WindowId>,
    last_absolute: (i32, i32),
}

impl MouseAggregation {
    /// Create an idle aggregation
    pub fn new() -> Self {
        Self::default()
    }

    /// A motion is waiting to be flushed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Pending `(x, y, relative)` if dirty
    pub fn pending(&self) -> Option<(i32, i32, bool)> {
        self.dirty.then_some((self.x, self.y, self.relative))
    }

    /// Last flushed absolute position
    pub fn position(&self) -> (i32, i32) {
        self.last_absolute
    }

    /// Record an absolute position that did not come from the event stream
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.last_absolute = (x, y);
    }

    /// Fold one split-axis sample into the pending motion
    ///
    /// A pending motion from another window, device or mode is flushed first
    /// and returned.
    pub fn accumulate(
        &mut self,
        window: Option<WindowId>,
        device: u16,
        axis: Axis,
        relative: bool,
        value: i32,
    ) -> Option<ToolkitEvent> {
        let flushed = if self.dirty
            && (self.relative != relative || self.window != window || self.device != device)
        {
            self.flush()
        } else {
            None
        };

        if !self.dirty {
            self.relative = relative;
            self.window = window;
            self.device = device;
            (self.x, self.y) = if relative { (0, 0) } else { self.last_absolute };
        }

        match (axis, relative) {
            (Axis::X, true) => self.x = self.x.saturating_add(value),
            (Axis::Y, true) => self.y = self.y.saturating_add(value),
            (Axis::X, false) => self.x = value,
            (Axis::Y, false) => self.y = value,
        }
        self.dirty = true;
        trace!("Mouse aggregate {:?} -> ({}, {})", axis, self.x, self.y);
        flushed
    }

    /// Emit the pending motion and clear the dirty flag
    pub fn flush(&mut self) -> Option<ToolkitEvent> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        if !self.relative {
            self.last_absolute = (self.x, self.y);
        }
        Some(ToolkitEvent::MouseMotion {
            window: self.window,
            device: self.device,
            relative: self.relative,
            x: self.x,
            y: self.y,
        })
    }

    /// Motion for a merged two-axis sample, bypassing aggregation
    pub fn merged(
        &mut self,
        window: Option<WindowId>,
        device: u16,
        relative: bool,
        x: i32,
        y: i32,
    ) -> ToolkitEvent {
        if !relative {
            self.last_absolute = (x, y);
        }
        ToolkitEvent::MouseMotion {
            window,
            device,
            relative,
            x,
            y,
        }
    }
}

/// Map a digital mouse sample to a button or wheel event
///
/// Wheel indices only produce an event on press. Unknown indices produce
/// nothing.
pub fn button_event(
    window: Option<WindowId>,
    device: u16,
    index: u16,
    active: bool,
) -> Option<ToolkitEvent> {
    let button = match index {
        mouse_button::LEFT => MouseButton::Left,
        mouse_button::RIGHT => MouseButton::Right,
        mouse_button::MIDDLE => MouseButton::Middle,
        mouse_button::WHEEL_UP | mouse_button::WHEEL_DOWN => {
            if !active {
                return None;
            }
            let y = if index == mouse_button::WHEEL_UP { -1 } else { 1 };
            return Some(ToolkitEvent::MouseWheel {
                window,
                device,
                x: 0,
                y,
            });
        }
        _ => return None,
    };
    Some(ToolkitEvent::MouseButton {
        window,
        device,
        button,
        pressed: active,
    })
}
