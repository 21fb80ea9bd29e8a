//! Shared connection state
//!
//! Everything both subsystems touch lives here, behind the one connection
//! mutex: the primary segment, the secondary segment table, the mouse
//! aggregation scratch, the pending event queue and the display geometry.

use tracing::{debug, warn};

use crate::events::mouse::MouseAggregation;
use crate::protocol::ExternalEvent;
use crate::registry::{PendingQueue, Result, SegmentError, SegmentRegistry};
use crate::transport::Segment;
use crate::types::{SegmentId, SlotIndex, WindowFlags, WindowId};

/// Cursor label asking the compositor to hide and confine the pointer
pub const RELATIVE_CURSOR_HINT: &str = "hidden-rel";

/// Toolkit window bound to the primary segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainWindow {
    /// Window id
    pub window: WindowId,
    /// Window flags
    pub flags: WindowFlags,
}

/// Display properties reported by the compositor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayGeometry {
    /// Display width
    pub width: u32,
    /// Display height
    pub height: u32,
    /// Refresh rate in Hz, 0 when unknown
    pub rate: u32,
}

/// State guarded by the shared connection mutex
pub struct ConnectionState {
    pub(crate) primary: Option<Box<dyn Segment>>,
    pub(crate) cursor: Option<Box<dyn Segment>>,
    pub(crate) refs: usize,
    pub(crate) main_window: Option<MainWindow>,
    pub(crate) mouse: MouseAggregation,
    pub(crate) relative_mode: bool,
    pub(crate) registry: SegmentRegistry,
    pub(crate) pending: PendingQueue,
    pub(crate) display: DisplayGeometry,
    pub(crate) lost: bool,
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("attached", &self.primary.is_some())
            .field("cursor", &self.cursor.is_some())
            .field("refs", &self.refs)
            .field("main_window", &self.main_window)
            .field("relative_mode", &self.relative_mode)
            .field("registry", &self.registry)
            .field("pending", &self.pending.len())
            .field("display", &self.display)
            .field("lost", &self.lost)
            .finish()
    }
}

impl ConnectionState {
    pub(crate) fn new(primary: Box<dyn Segment>) -> Self {
        let (width, height) = primary.size();
        Self {
            primary: Some(primary),
            cursor: None,
            refs: 0,
            main_window: None,
            mouse: MouseAggregation::new(),
            relative_mode: false,
            registry: SegmentRegistry::new(),
            pending: PendingQueue::new(),
            display: DisplayGeometry {
                width,
                height,
                rate: 0,
            },
            lost: false,
        }
    }

    /// Subsystems currently attached
    pub fn refs(&self) -> usize {
        self.refs
    }

    /// Primary segment is still mapped
    pub fn is_attached(&self) -> bool {
        self.primary.is_some()
    }

    /// Connection died; no further segment operations are attempted
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Borrow the primary segment
    pub fn primary_mut(&mut self) -> Option<&mut (dyn Segment + 'static)> {
        self.primary.as_deref_mut()
    }

    /// Borrow any segment owned by the connection
    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut (dyn Segment + 'static)> {
        match id {
            SegmentId::Primary => self.primary.as_deref_mut(),
            SegmentId::Slot(slot) => self.registry.get_mut(slot).map(|e| e.segment.as_mut()),
            SegmentId::Cursor => self.cursor.as_deref_mut(),
        }
    }

    /// Window bound to the primary segment
    pub fn main_window(&self) -> Option<MainWindow> {
        self.main_window
    }

    /// Display geometry
    pub fn display(&self) -> DisplayGeometry {
        self.display
    }

    /// Secondary segment table
    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    /// Events parked by negotiations and not yet replayed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Mouse aggregation scratch
    pub fn mouse(&self) -> &MouseAggregation {
        &self.mouse
    }

    /// Toolkit relative mouse mode
    pub fn relative_mode(&self) -> bool {
        self.relative_mode
    }

    /// Segment backing a window
    pub fn window_segment(&self, window: WindowId) -> Option<SegmentId> {
        if self.main_window.is_some_and(|m| m.window == window) {
            return Some(SegmentId::Primary);
        }
        self.registry.find_window(window).map(SegmentId::Slot)
    }

    /// Bind a window to the primary segment; `false` if one is already bound
    pub fn bind_main_window(&mut self, window: WindowId, flags: WindowFlags) -> bool {
        if self.main_window.is_some() {
            return false;
        }
        self.main_window = Some(MainWindow { window, flags });
        debug!("{} bound to primary", window);
        true
    }

    /// Clear the primary back-reference if it points at `window`
    pub fn unbind_main_window(&mut self, window: WindowId) -> bool {
        if self.main_window.is_some_and(|m| m.window == window) {
            self.main_window = None;
            return true;
        }
        false
    }

    /// Send a window segment request for the lowest free slot
    pub fn begin_window_request(
        &mut self,
        width: u32,
        height: u32,
        window: WindowId,
        flags: WindowFlags,
    ) -> Result<SlotIndex> {
        if self.lost {
            return Err(SegmentError::ProtocolInconsistent(
                "connection lost".to_string(),
            ));
        }
        let primary = self.primary.as_deref_mut().ok_or(SegmentError::NotConnected)?;
        self.registry
            .begin_request(primary, width, height, window, flags)
    }

    /// Run one negotiation pass for the outstanding window request
    pub fn poll_window_request(&mut self) -> Result<Option<SlotIndex>> {
        let primary = self.primary.as_deref_mut().ok_or(SegmentError::NotConnected)?;
        match self.registry.poll_request(primary, &mut self.pending) {
            Ok(Some(slot)) => {
                if self.relative_mode {
                    self.hint_relative(slot);
                }
                Ok(Some(slot))
            }
            Err(e @ SegmentError::ProtocolInconsistent(_)) => {
                self.lost = true;
                Err(e)
            }
            other => other,
        }
    }

    /// Request a window segment and wait for the answer under this borrow
    ///
    /// Holds the caller's lock for the whole negotiation; prefer
    /// [`SharedConnection::request_window`](super::SharedConnection::request_window)
    /// when other threads use the connection.
    pub fn request_window(
        &mut self,
        width: u32,
        height: u32,
        window: WindowId,
        flags: WindowFlags,
    ) -> Result<SlotIndex> {
        self.begin_window_request(width, height, window, flags)?;
        loop {
            if let Some(slot) = self.poll_window_request()? {
                return Ok(slot);
            }
            std::thread::yield_now();
        }
    }

    /// Drop a window segment and clear any back-reference to it
    pub fn release_window(&mut self, slot: SlotIndex) -> Result<()> {
        let entry = self.registry.release(slot)?;
        self.unbind_main_window(entry.window);
        Ok(())
    }

    fn hint_relative(&mut self, slot: SlotIndex) {
        if let Some(entry) = self.registry.get_mut(slot) {
            if let Err(e) = entry
                .segment
                .enqueue(ExternalEvent::CursorHint(RELATIVE_CURSOR_HINT.to_string()))
            {
                warn!("Failed to hint relative mode on {}: {}", slot, e);
            }
        }
    }

    pub(crate) fn teardown(&mut self) {
        let released = self.registry.clear();
        self.cursor = None;
        self.main_window = None;
        let dropped = self.pending.take().len();
        self.primary = None;
        debug!(
            "Connection torn down ({} secondary segment(s), {} pending event(s) dropped)",
            released, dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SegmentKind;
    use crate::transport::loopback::LoopbackCompositor;
    use crate::transport::Connector;

    fn state(compositor: &LoopbackCompositor) -> ConnectionState {
        let primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        ConnectionState::new(primary)
    }

    #[test]
    fn test_display_geometry_from_primary() {
        let compositor = LoopbackCompositor::with_size(800, 600);
        let state = state(&compositor);
        assert_eq!(
            state.display(),
            DisplayGeometry {
                width: 800,
                height: 600,
                rate: 0,
            }
        );
    }

    #[test]
    fn test_main_window_binding() {
        let compositor = LoopbackCompositor::new();
        let mut state = state(&compositor);

        assert!(state.bind_main_window(WindowId(1), WindowFlags::default()));
        assert!(!state.bind_main_window(WindowId(2), WindowFlags::default()));
        assert_eq!(state.window_segment(WindowId(1)), Some(SegmentId::Primary));

        assert!(state.unbind_main_window(WindowId(1)));
        assert_eq!(state.window_segment(WindowId(1)), None);
    }

    #[test]
    fn test_window_request_and_release() {
        let compositor = LoopbackCompositor::new();
        let mut state = state(&compositor);

        let slot = state
            .request_window(100, 100, WindowId(5), WindowFlags::default())
            .unwrap();
        assert_eq!(state.window_segment(WindowId(5)), Some(SegmentId::Slot(slot)));
        assert_eq!(state.segment_mut(SegmentId::Slot(slot)).unwrap().size(), (100, 100));

        state.release_window(slot).unwrap();
        assert_eq!(state.registry().mask(), 0);
        assert!(state.segment_mut(SegmentId::Slot(slot)).is_none());
    }

    #[test]
    fn test_relative_mode_hints_new_windows() {
        let compositor = LoopbackCompositor::new();
        let mut state = state(&compositor);
        state.relative_mode = true;

        state
            .request_window(10, 10, WindowId(2), WindowFlags::default())
            .unwrap();
        let hinted = compositor.take_outbound().into_iter().any(|(_, event)| {
            event == ExternalEvent::CursorHint(RELATIVE_CURSOR_HINT.to_string())
        });
        assert!(hinted);
    }

    #[test]
    fn test_teardown_drops_segments() {
        let compositor = LoopbackCompositor::new();
        let mut state = state(&compositor);
        state
            .request_window(10, 10, WindowId(2), WindowFlags::default())
            .unwrap();
        assert_eq!(compositor.live_segments(), 2);

        state.teardown();
        assert!(!state.is_attached());
        assert_eq!(compositor.live_segments(), 0);
    }

    #[test]
    fn test_lost_connection_refuses_requests() {
        let compositor = LoopbackCompositor::new();
        let mut state = state(&compositor);
        state.lost = true;
        assert!(matches!(
            state.begin_window_request(1, 1, WindowId(1), WindowFlags::default()),
            Err(SegmentError::ProtocolInconsistent(_))
        ));
    }
}
