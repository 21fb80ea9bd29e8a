//! Host driver tables
//!
//! The host toolkit drives the bridge through a fixed callback table. These
//! traits spell that table out; [`VideoDevice`](crate::video::VideoDevice)
//! and [`AudioDevice`](crate::audio::AudioDevice) implement them, and a host
//! binding maps its own registration mechanism onto them.

use std::ffi::c_void;
use std::path::Path;

use crate::audio::{self, AudioDeviceInfo, AudioSpec, TransferStats};
use crate::connection::Detach;
use crate::cursor::{Cursor, SystemCursor};
use crate::events::PumpOutcome;
use crate::gl::ContextHandle;
use crate::types::{Rect, WindowFlags, WindowId};
use crate::video;

/// Bootstrap entry the host lists among its drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Driver name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// Bootstrap metadata for both the video and the audio driver
pub const BOOTSTRAP: DriverInfo = DriverInfo {
    name: "arcan",
    description: "Arcan shmif driver",
};

/// Video driver callbacks
pub trait VideoDriver {
    /// Create a window backed by a segment
    fn create_window(
        &mut self,
        window: WindowId,
        width: u32,
        height: u32,
        flags: WindowFlags,
    ) -> video::Result<()>;

    /// Destroy a window and release its segment
    fn destroy_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Set a window title
    fn set_window_title(&mut self, window: WindowId, title: &str) -> video::Result<()>;

    /// Show a window
    fn show_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Hide a window
    fn hide_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Resize a window
    fn set_window_size(&mut self, window: WindowId, width: u32, height: u32) -> video::Result<()>;

    /// Fullscreen request, left to the compositor
    fn set_window_fullscreen(&mut self, window: WindowId, fullscreen: bool) -> video::Result<()>;

    /// Maximize request, left to the compositor
    fn maximize_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Minimize request, left to the compositor
    fn minimize_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Position request, left to the compositor
    fn set_window_position(&mut self, window: WindowId, x: i32, y: i32) -> video::Result<()>;

    /// Bounds of the display
    fn display_bounds(&self) -> Rect;

    /// Translate pending protocol events
    fn pump_events(&mut self) -> PumpOutcome;

    /// Load the GL library
    fn gl_load_library(&mut self, path: Option<&Path>) -> video::Result<()>;

    /// Unload the GL library
    fn gl_unload_library(&mut self);

    /// Resolve a GL entry point
    fn gl_get_proc_address(&self, name: &str) -> *const c_void;

    /// Create a GL context for a window and make it current
    fn gl_create_context(&mut self, window: WindowId) -> video::Result<ContextHandle>;

    /// Bind a GL context, or release the current one
    fn gl_make_current(&mut self, context: Option<ContextHandle>) -> video::Result<()>;

    /// Delete a GL context
    fn gl_delete_context(&mut self, context: ContextHandle) -> video::Result<()>;

    /// Present a window
    fn gl_swap_window(&mut self, window: WindowId) -> video::Result<()>;

    /// Cursor for a system cursor id
    fn create_system_cursor(&mut self, id: SystemCursor) -> Cursor;

    /// Cursor from pre-converted pixels
    fn create_cursor(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        hot_x: i32,
        hot_y: i32,
    ) -> video::Result<Cursor>;

    /// Show a cursor, or hide the pointer
    fn show_cursor(&mut self, cursor: Option<&Cursor>) -> video::Result<()>;

    /// Release a cursor
    fn free_cursor(&mut self, cursor: Cursor);

    /// Move the pointer within a window
    fn warp_mouse(&mut self, window: Option<WindowId>, x: i32, y: i32) -> video::Result<()>;

    /// Move the pointer in global coordinates
    fn warp_mouse_global(&mut self, x: i32, y: i32) -> video::Result<()>;

    /// Toggle relative mouse mode
    fn set_relative_mouse_mode(&mut self, enabled: bool) -> video::Result<()>;

    /// Last known pointer position
    fn global_mouse_state(&self) -> (i32, i32);

    /// Shut the driver down
    fn quit(self) -> Detach
    where
        Self: Sized;
}

/// Audio driver callbacks
pub trait AudioDriver {
    /// Devices the driver offers
    fn detect_devices() -> Vec<AudioDeviceInfo>
    where
        Self: Sized;

    /// Negotiated output format
    fn spec(&self) -> &AudioSpec;

    /// Buffer the host mixes into
    fn get_buffer(&mut self) -> &mut [u8];

    /// Push the mixed buffer to the compositor
    fn play(&mut self) -> audio::Result<TransferStats>;

    /// Close the device
    fn close(self) -> Detach
    where
        Self: Sized;
}
