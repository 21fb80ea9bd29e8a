//! Cursor management
//!
//! The compositor draws the cursor. Clients either name one of its cursors
//! through a `CURSORHINT` label or hand it a bitmap on a dedicated cursor
//! segment, negotiated like a window segment but kept outside the slot table.
//!
//! | Cursor | Shown by |
//! |--------|----------|
//! | [`Cursor::Label`] | `CURSORHINT(label)` on the primary segment |
//! | [`Cursor::Bitmap`] | viewport hint making the cursor segment visible |
//! | none | `CURSORHINT("hidden")` |

pub mod error;

pub use error::{classify_error, CursorError, Result};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::connection::{ConnectionState, SharedConnection, RELATIVE_CURSOR_HINT};
use crate::protocol::{ExternalEvent, SegmentKind, VIDEO_PIXEL_BYTES};
use crate::registry::{SegmentError, CURSOR_TAG};
use crate::transport::Signal;
use crate::types::{SegmentId, WindowId};

/// Label the compositor uses for its standard pointer
pub const DEFAULT_CURSOR: &str = "default";

/// Label hiding the pointer
pub const HIDDEN_CURSOR: &str = "hidden";

/// Toolkit system cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemCursor {
    /// Arrow
    Arrow,
    /// Text insertion beam
    IBeam,
    /// Busy
    Wait,
    /// Crosshair
    Crosshair,
    /// Busy but interactive
    WaitArrow,
    /// Diagonal resize, northwest to southeast
    SizeNwse,
    /// Diagonal resize, northeast to southwest
    SizeNesw,
    /// Horizontal resize
    SizeWe,
    /// Vertical resize
    SizeNs,
    /// Move
    SizeAll,
    /// Forbidden
    No,
    /// Pointing hand
    Hand,
}

impl SystemCursor {
    /// Compositor cursor label
    pub fn label(self) -> &'static str {
        match self {
            SystemCursor::Arrow => DEFAULT_CURSOR,
            SystemCursor::IBeam => "typefield",
            SystemCursor::Wait | SystemCursor::WaitArrow => "wait",
            SystemCursor::Crosshair => "crosshair",
            SystemCursor::SizeNwse => "rz_diag_r",
            SystemCursor::SizeNesw => "rz_diag_l",
            SystemCursor::SizeWe => "rz_left",
            SystemCursor::SizeNs => "rz_up",
            SystemCursor::SizeAll => "move",
            SystemCursor::No => "forbidden",
            SystemCursor::Hand => "hand",
        }
    }
}

/// Cursor created for the toolkit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Compositor-drawn cursor picked by label
    Label(String),
    /// Client bitmap on the cursor segment
    Bitmap {
        /// Bitmap width
        width: u32,
        /// Bitmap height
        height: u32,
        /// Hotspot x
        hot_x: i32,
        /// Hotspot y
        hot_y: i32,
    },
}

/// Cursor operations against the shared connection
#[derive(Debug, Clone)]
pub struct CursorManager {
    connection: Arc<SharedConnection>,
    poll_interval: Duration,
}

impl CursorManager {
    /// Create a manager for a connection
    pub fn new(connection: Arc<SharedConnection>, poll_interval: Duration) -> Self {
        Self {
            connection,
            poll_interval,
        }
    }

    /// Cursor for a system cursor id
    pub fn create_system(&self, id: SystemCursor) -> Cursor {
        Cursor::Label(id.label().to_string())
    }

    /// Create a bitmap cursor from pre-converted pixels
    ///
    /// Falls back to the default label cursor when the compositor refuses
    /// the cursor segment.
    pub fn create_bitmap(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        hot_x: i32,
        hot_y: i32,
    ) -> Result<Cursor> {
        let expected = width as usize * height as usize * VIDEO_PIXEL_BYTES;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(CursorError::InvalidBitmap {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        let has_segment = self.connection.lock().cursor.is_some();
        if !has_segment {
            match self.connection.negotiate(
                SegmentKind::Cursor,
                width,
                height,
                CURSOR_TAG,
                self.poll_interval,
            ) {
                Ok(segment) => {
                    info!("Cursor segment mapped ({}x{})", width, height);
                    self.connection.lock().cursor = Some(segment);
                }
                Err(SegmentError::SegmentRejected { .. }) => {
                    warn!("Cursor segment rejected, using default cursor");
                    return Ok(Cursor::Label(DEFAULT_CURSOR.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut state = self.connection.lock();
        let segment = state.cursor.as_deref_mut().ok_or(CursorError::NoCursorSegment)?;
        if segment.size() != (width, height) {
            if let Err(e) = segment.resize(width, height) {
                warn!("Cursor segment resize refused ({}), using default cursor", e);
                return Ok(Cursor::Label(DEFAULT_CURSOR.to_string()));
            }
        }

        let buffer = segment.video_buffer();
        let len = buffer.len().min(pixels.len());
        buffer[..len].copy_from_slice(&pixels[..len]);
        segment.signal(Signal::Video)?;

        debug!("Cursor bitmap uploaded, hotspot ({}, {})", hot_x, hot_y);
        Ok(Cursor::Bitmap {
            width,
            height,
            hot_x,
            hot_y,
        })
    }

    /// Show a cursor, or hide the pointer with `None`
    pub fn show(&self, cursor: Option<&Cursor>) -> Result<()> {
        let mut state = self.connection.lock();
        match cursor {
            Some(Cursor::Bitmap { .. }) => {
                let segment = state.cursor.as_deref_mut().ok_or(CursorError::NoCursorSegment)?;
                segment.enqueue(ExternalEvent::ViewportHint { invisible: false })?;
            }
            Some(Cursor::Label(label)) => {
                hide_cursor_segment(&mut state);
                hint_primary(&mut state, label)?;
            }
            None => {
                hide_cursor_segment(&mut state);
                hint_primary(&mut state, HIDDEN_CURSOR)?;
            }
        }
        Ok(())
    }

    /// Release a cursor; bitmap cursors drop the cursor segment
    pub fn free(&self, cursor: Cursor) {
        if let Cursor::Bitmap { .. } = cursor {
            if self.connection.lock().cursor.take().is_some() {
                debug!("Cursor segment released");
            }
        }
    }

    /// Move the pointer inside a window
    ///
    /// Windows without a segment warp relative to the primary.
    pub fn warp(&self, window: Option<WindowId>, x: i32, y: i32) -> Result<()> {
        let mut state = self.connection.lock();
        let id = window
            .and_then(|w| state.window_segment(w))
            .unwrap_or(SegmentId::Primary);
        let segment = state.segment_mut(id).ok_or(CursorError::NotConnected)?;
        segment.enqueue(ExternalEvent::CursorInput { x, y })?;
        state.mouse.set_position(x, y);
        Ok(())
    }

    /// Move the pointer in global coordinates
    pub fn warp_global(&self, _x: i32, _y: i32) -> Result<()> {
        Err(CursorError::Unsupported("global pointer warp"))
    }

    /// Toggle relative mouse mode on every live segment
    pub fn set_relative_mode(&self, enabled: bool) -> Result<()> {
        let mut state = self.connection.lock();
        state.relative_mode = enabled;
        let label = if enabled {
            RELATIVE_CURSOR_HINT
        } else {
            DEFAULT_CURSOR
        };

        hint_primary(&mut state, label)?;
        for (slot, entry) in state.registry.live_mut() {
            if let Err(e) = entry
                .segment_mut()
                .enqueue(ExternalEvent::CursorHint(label.to_string()))
            {
                warn!("Failed to send cursor hint to {}: {}", slot, e);
            }
        }
        debug!("Relative mouse mode {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    /// Last absolute pointer position seen
    pub fn global_state(&self) -> (i32, i32) {
        self.connection.lock().mouse.position()
    }
}

fn hint_primary(state: &mut ConnectionState, label: &str) -> Result<()> {
    let primary = state.primary_mut().ok_or(CursorError::NotConnected)?;
    primary.enqueue(ExternalEvent::CursorHint(label.to_string()))?;
    Ok(())
}

fn hide_cursor_segment(state: &mut ConnectionState) {
    if let Some(segment) = state.cursor.as_deref_mut() {
        if let Err(e) = segment.enqueue(ExternalEvent::ViewportHint { invisible: true }) {
            debug!("Failed to hide cursor segment: {}", e);
        }
    }
}
