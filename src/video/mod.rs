//! Video device
//!
//! The mapping layer between the host's window callbacks and the core. The
//! first window binds the primary segment; later windows negotiate secondary
//! segments through the registry. Every callback takes the connection lock
//! for its duration, except window negotiation, which releases it between
//! poll passes.
//!
//! # Lifecycle
//!
//! ```text
//! init ──> create_window ──> pump_events / gl_* / cursor (repeat) ──> quit
//!  └─ attaches (refs += 1)                                             └─ detaches
//! ```

pub mod error;

pub use error::{classify_error, Result, VideoError};

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Attachment, Bootstrap, ConnectionState, Detach, SharedConnection};
use crate::cursor::{Cursor, CursorManager, SystemCursor};
use crate::driver::VideoDriver;
use crate::events::{EventTranslator, Keymap, PumpOutcome};
use crate::gl::{AcceleratedBackend, ContextHandle, GlBridge};
use crate::protocol::{clamp_message, ExternalEvent};
use crate::registry::SegmentError;
use crate::transport::{Connector, Segment};
use crate::types::{Rect, SegmentId, WindowFlags, WindowId};

#[derive(Debug, Clone)]
struct WindowRecord {
    segment: SegmentId,
    flags: WindowFlags,
    visible: bool,
}

/// Video device
#[derive(Debug)]
pub struct VideoDevice {
    attachment: Attachment,
    connection: Arc<SharedConnection>,
    translator: EventTranslator,
    gl: GlBridge,
    cursor: CursorManager,
    windows: HashMap<WindowId, WindowRecord>,
    poll_interval: Duration,
}

impl VideoDevice {
    /// Whether the connection environment is present
    pub fn is_available(config: &Config) -> bool {
        std::env::var_os(&config.connection.env_var).is_some()
    }

    /// Initialize the device, attaching to the shared connection
    pub fn init(
        bootstrap: &Bootstrap,
        connector: &dyn Connector,
        config: &Config,
        backend: Box<dyn AcceleratedBackend>,
    ) -> Result<Self> {
        if !Self::is_available(config) {
            return Err(VideoError::EnvironmentMissing(
                config.connection.env_var.clone(),
            ));
        }

        let attachment = bootstrap.ensure_primary(connector, config.primary_kind())?;
        let connection = Arc::clone(attachment.connection());
        let poll_interval = config.request_poll_interval();

        let geometry = connection.lock().display();
        info!(
            "Video device initialized, display {}x{}",
            geometry.width, geometry.height
        );

        Ok(Self {
            translator: EventTranslator::new(
                Keymap::new(config.keymap()),
                config.video.pump_event_budget,
            ),
            gl: GlBridge::new(backend, &config.gl),
            cursor: CursorManager::new(Arc::clone(&connection), poll_interval),
            windows: HashMap::new(),
            attachment,
            connection,
            poll_interval,
        })
    }

    /// Shared connection this device is attached to
    pub fn connection(&self) -> &Arc<SharedConnection> {
        &self.connection
    }

    /// Cursor operations
    pub fn cursor(&self) -> &CursorManager {
        &self.cursor
    }

    /// GL bridge
    pub fn gl(&self) -> &GlBridge {
        &self.gl
    }

    /// Segment backing a window
    pub fn window_segment(&self, window: WindowId) -> Option<SegmentId> {
        self.windows.get(&window).map(|w| w.segment)
    }

    /// Flags a window was created with
    pub fn window_flags(&self, window: WindowId) -> Option<WindowFlags> {
        self.windows.get(&window).map(|w| w.flags)
    }

    /// Whether a window is visible
    pub fn is_visible(&self, window: WindowId) -> Option<bool> {
        self.windows.get(&window).map(|w| w.visible)
    }

    /// Windows created and not destroyed
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn record(&self, window: WindowId) -> Result<&WindowRecord> {
        self.windows
            .get(&window)
            .ok_or(VideoError::UnknownWindow(window))
    }

    fn with_segment<T>(
        &self,
        window: WindowId,
        f: impl FnOnce(&mut dyn Segment) -> Result<T>,
    ) -> Result<T> {
        let id = self.record(window)?.segment;
        let mut state = self.connection.lock();
        let segment = state.segment_mut(id).ok_or(VideoError::NotConnected)?;
        f(segment)
    }

    fn set_visible(&mut self, window: WindowId, visible: bool) -> Result<()> {
        self.with_segment(window, |segment| {
            segment.enqueue(ExternalEvent::ViewportHint {
                invisible: !visible,
            })?;
            Ok(())
        })?;
        if let Some(record) = self.windows.get_mut(&window) {
            record.visible = visible;
        }
        Ok(())
    }

    fn bind_primary(
        state: &mut ConnectionState,
        window: WindowId,
        width: u32,
        height: u32,
        flags: WindowFlags,
    ) -> bool {
        if !state.bind_main_window(window, flags) {
            return false;
        }
        if let Some(primary) = state.primary_mut() {
            if primary.size() != (width, height) {
                if let Err(e) = primary.resize(width, height) {
                    warn!(
                        "Primary segment kept its size for {} ({}x{} refused: {})",
                        window, width, height, e
                    );
                }
            }
        }
        true
    }

    /// Give a window's segment back; an unknown slot fails before anything is released
    fn release_segment(&mut self, window: WindowId, segment: SegmentId) -> Result<()> {
        let mut state = self.connection.lock();
        if let SegmentId::Slot(slot) = segment {
            if state.registry().get(slot).is_none() {
                return Err(SegmentError::UnknownSlot(slot).into());
            }
        }
        self.gl.forget_segment(&mut state, segment);
        match segment {
            SegmentId::Slot(slot) => state.release_window(slot)?,
            _ => {
                state.unbind_main_window(window);
            }
        }
        Ok(())
    }
}

impl VideoDriver for VideoDevice {
    fn create_window(
        &mut self,
        window: WindowId,
        width: u32,
        height: u32,
        flags: WindowFlags,
    ) -> Result<()> {
        if self.windows.contains_key(&window) {
            return Err(VideoError::WindowExists(window));
        }

        let bound = {
            let mut state = self.connection.lock();
            Self::bind_primary(&mut state, window, width, height, flags)
        };
        let segment = if bound {
            SegmentId::Primary
        } else {
            let slot =
                self.connection
                    .request_window(width, height, window, flags, self.poll_interval)?;
            SegmentId::Slot(slot)
        };

        self.windows.insert(
            window,
            WindowRecord {
                segment,
                flags,
                visible: true,
            },
        );
        info!("{} created on {} ({}x{})", window, segment, width, height);

        if flags.hidden {
            if let Err(e) = self.set_visible(window, false) {
                self.windows.remove(&window);
                if let Err(release) = self.release_segment(window, segment) {
                    warn!("Failed to roll back {} on {}: {}", window, segment, release);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        let segment = self.record(window)?.segment;
        self.release_segment(window, segment)?;
        self.windows.remove(&window);
        debug!("{} destroyed", window);
        Ok(())
    }

    fn set_window_title(&mut self, window: WindowId, title: &str) -> Result<()> {
        let title = clamp_message(title).to_string();
        self.with_segment(window, |segment| {
            segment.enqueue(ExternalEvent::Ident(title))?;
            Ok(())
        })
    }

    fn show_window(&mut self, window: WindowId) -> Result<()> {
        self.set_visible(window, true)
    }

    fn hide_window(&mut self, window: WindowId) -> Result<()> {
        self.set_visible(window, false)
    }

    fn set_window_size(&mut self, window: WindowId, width: u32, height: u32) -> Result<()> {
        let id = self.record(window)?.segment;
        let mut state = self.connection.lock();
        let segment = state.segment_mut(id).ok_or(VideoError::NotConnected)?;
        if let Err(e) = segment.resize(width, height) {
            debug!("Resize of {} refused: {}", window, e);
            return Err(VideoError::ResizeRejected {
                window,
                width,
                height,
            });
        }
        self.gl.on_segment_resized(&mut state, id)?;
        Ok(())
    }

    fn set_window_fullscreen(&mut self, window: WindowId, fullscreen: bool) -> Result<()> {
        self.record(window)?;
        debug!("Fullscreen {} ignored for {}", fullscreen, window);
        Ok(())
    }

    fn maximize_window(&mut self, window: WindowId) -> Result<()> {
        self.record(window)?;
        debug!("Maximize ignored for {}", window);
        Ok(())
    }

    fn minimize_window(&mut self, window: WindowId) -> Result<()> {
        self.record(window)?;
        debug!("Minimize ignored for {}", window);
        Ok(())
    }

    fn set_window_position(&mut self, window: WindowId, x: i32, y: i32) -> Result<()> {
        self.record(window)?;
        debug!("Position ({}, {}) ignored for {}", x, y, window);
        Ok(())
    }

    fn display_bounds(&self) -> Rect {
        let display = self.connection.lock().display();
        Rect {
            x: 0,
            y: 0,
            width: display.width,
            height: display.height,
        }
    }

    fn pump_events(&mut self) -> PumpOutcome {
        let mut state = self.connection.lock();
        let outcome = self.translator.pump(&mut state);
        for (segment, width, height) in &outcome.resized {
            if let Err(e) = self.gl.on_segment_resized(&mut state, *segment) {
                warn!(
                    "Failed to rebind GL after {} resized to {}x{}: {}",
                    segment, width, height, e
                );
            }
        }
        outcome
    }

    fn gl_load_library(&mut self, path: Option<&Path>) -> Result<()> {
        self.gl.load_library(path)?;
        Ok(())
    }

    fn gl_unload_library(&mut self) {
        self.gl.unload_library();
    }

    fn gl_get_proc_address(&self, name: &str) -> *const c_void {
        self.gl.get_proc_address(name)
    }

    fn gl_create_context(&mut self, window: WindowId) -> Result<ContextHandle> {
        let id = self.record(window)?.segment;
        let mut state = self.connection.lock();
        Ok(self.gl.create_context(&mut state, id)?)
    }

    fn gl_make_current(&mut self, context: Option<ContextHandle>) -> Result<()> {
        let mut state = self.connection.lock();
        Ok(self.gl.make_current(&mut state, context)?)
    }

    fn gl_delete_context(&mut self, context: ContextHandle) -> Result<()> {
        let mut state = self.connection.lock();
        Ok(self.gl.delete_context(&mut state, context)?)
    }

    fn gl_swap_window(&mut self, window: WindowId) -> Result<()> {
        let id = self.record(window)?.segment;
        let mut state = self.connection.lock();
        Ok(self.gl.swap_window(&mut state, id)?)
    }

    fn create_system_cursor(&mut self, id: SystemCursor) -> Cursor {
        self.cursor.create_system(id)
    }

    fn create_cursor(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        hot_x: i32,
        hot_y: i32,
    ) -> Result<Cursor> {
        Ok(self
            .cursor
            .create_bitmap(pixels, width, height, hot_x, hot_y)?)
    }

    fn show_cursor(&mut self, cursor: Option<&Cursor>) -> Result<()> {
        Ok(self.cursor.show(cursor)?)
    }

    fn free_cursor(&mut self, cursor: Cursor) {
        self.cursor.free(cursor);
    }

    fn warp_mouse(&mut self, window: Option<WindowId>, x: i32, y: i32) -> Result<()> {
        Ok(self.cursor.warp(window, x, y)?)
    }

    fn warp_mouse_global(&mut self, x: i32, y: i32) -> Result<()> {
        Ok(self.cursor.warp_global(x, y)?)
    }

    fn set_relative_mouse_mode(&mut self, enabled: bool) -> Result<()> {
        Ok(self.cursor.set_relative_mode(enabled)?)
    }

    fn global_mouse_state(&self) -> (i32, i32) {
        self.cursor.global_state()
    }

    fn quit(mut self) -> Detach {
        {
            let mut state = self.connection.lock();
            self.gl.shutdown(&mut state);
        }
        info!("Video device shut down with {} window(s) open", self.windows.len());
        self.windows.clear();
        self.attachment.detach()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ToolkitEvent, WindowEvent};
    use crate::gl::HeadlessBackend;
    use crate::protocol::{DisplayHintFlags, Event, TargetCommand};
    use crate::transport::loopback::{LoopbackCompositor, ResizePolicy};

    fn config(env_var: &str) -> Config {
        std::env::set_var(env_var, "loopback");
        let mut config = Config::default_config();
        config.connection.env_var = env_var.to_string();
        config
    }

    fn device(compositor: &LoopbackCompositor, env_var: &str) -> VideoDevice {
        VideoDevice::init(
            &Bootstrap::new(),
            &compositor.connector(),
            &config(env_var),
            Box::new(HeadlessBackend::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_init_requires_environment() {
        let compositor = LoopbackCompositor::new();
        let mut config = Config::default_config();
        config.connection.env_var = "SHMIF_BRIDGE_TEST_UNSET_VIDEO".to_string();

        let result = VideoDevice::init(
            &Bootstrap::new(),
            &compositor.connector(),
            &config,
            Box::new(HeadlessBackend::new()),
        );
        assert!(matches!(result, Err(VideoError::EnvironmentMissing(_))));
    }

    #[test]
    fn test_first_window_binds_primary() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_PRIMARY");

        device
            .create_window(WindowId(1), 320, 200, WindowFlags::resizable())
            .unwrap();
        device
            .create_window(WindowId(2), 64, 64, WindowFlags::default())
            .unwrap();

        assert_eq!(device.window_segment(WindowId(1)), Some(SegmentId::Primary));
        assert!(matches!(
            device.window_segment(WindowId(2)),
            Some(SegmentId::Slot(_))
        ));
        let primary = compositor.primary().unwrap();
        assert_eq!(compositor.segment(primary).unwrap().width, 320);
        assert_eq!(compositor.live_segments(), 2);

        device.destroy_window(WindowId(2)).unwrap();
        assert_eq!(compositor.live_segments(), 1);
        assert!(matches!(
            device.destroy_window(WindowId(2)),
            Err(VideoError::UnknownWindow(_))
        ));
    }

    #[test]
    fn test_title_is_clamped() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_TITLE");
        device
            .create_window(WindowId(1), 100, 100, WindowFlags::default())
            .unwrap();
        compositor.take_outbound();

        let title = "x".repeat(200);
        device.set_window_title(WindowId(1), &title).unwrap();
        let outbound = compositor.take_outbound();
        assert!(matches!(
            &outbound[..],
            [(_, ExternalEvent::Ident(sent))] if sent.len() <= crate::protocol::MESSAGE_CAPACITY
        ));
    }

    #[test]
    fn test_show_hide_hints() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_SHOW");
        device
            .create_window(
                WindowId(1),
                100,
                100,
                WindowFlags {
                    resizable: false,
                    hidden: true,
                },
            )
            .unwrap();
        assert_eq!(device.is_visible(WindowId(1)), Some(false));

        device.show_window(WindowId(1)).unwrap();
        assert_eq!(device.is_visible(WindowId(1)), Some(true));

        let hints: Vec<bool> = compositor
            .take_outbound()
            .into_iter()
            .filter_map(|(_, e)| match e {
                ExternalEvent::ViewportHint { invisible } => Some(invisible),
                _ => None,
            })
            .collect();
        assert_eq!(hints, vec![true, false]);
    }

    #[test]
    fn test_failed_hidden_create_leaves_nothing_bound() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_HIDDEN_SEVERED");
        compositor.sever();

        let hidden = WindowFlags {
            resizable: false,
            hidden: true,
        };
        let result = device.create_window(WindowId(1), 640, 480, hidden);
        assert!(matches!(result, Err(VideoError::Transport(_))));
        assert_eq!(device.window_count(), 0);
        assert_eq!(device.window_segment(WindowId(1)), None);
        assert!(device.connection().lock().main_window().is_none());

        let retry = device.create_window(WindowId(1), 640, 480, hidden);
        assert!(matches!(retry, Err(VideoError::Transport(_))));
        assert_eq!(device.window_count(), 0);
    }

    #[test]
    fn test_destroy_keeps_record_when_slot_is_gone() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_DESTROY_STALE");
        device
            .create_window(WindowId(1), 320, 200, WindowFlags::default())
            .unwrap();
        device
            .create_window(WindowId(2), 64, 64, WindowFlags::default())
            .unwrap();
        let Some(SegmentId::Slot(slot)) = device.window_segment(WindowId(2)) else {
            panic!("expected a secondary segment");
        };

        device.connection().lock().release_window(slot).unwrap();
        assert!(matches!(
            device.destroy_window(WindowId(2)),
            Err(VideoError::Segment(SegmentError::UnknownSlot(s))) if s == slot
        ));
        assert_eq!(device.window_segment(WindowId(2)), Some(SegmentId::Slot(slot)));

        device.destroy_window(WindowId(1)).unwrap();
        assert_eq!(device.window_segment(WindowId(1)), None);
        assert!(device.connection().lock().main_window().is_none());
    }

    #[test]
    fn test_resize_refused() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_RESIZE");
        device
            .create_window(WindowId(1), 100, 100, WindowFlags::default())
            .unwrap();

        compositor.set_resize_policy(ResizePolicy::Refuse);
        assert!(matches!(
            device.set_window_size(WindowId(1), 300, 300),
            Err(VideoError::ResizeRejected { .. })
        ));

        compositor.set_resize_policy(ResizePolicy::Accept);
        device.set_window_size(WindowId(1), 300, 300).unwrap();
        let primary = compositor.primary().unwrap();
        assert_eq!(compositor.segment(primary).unwrap().height, 300);
    }

    #[test]
    fn test_display_bounds_follow_output_hint() {
        let compositor = LoopbackCompositor::with_size(800, 600);
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_BOUNDS");
        assert_eq!(device.display_bounds().width, 800);

        compositor.send_primary(Event::Target(TargetCommand::OutputHint {
            width: 1920,
            height: 1080,
            rate: 60,
        }));
        device.pump_events();
        assert_eq!(
            device.display_bounds(),
            Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            }
        );
    }

    #[test]
    fn test_display_hint_resizes_and_rebinds_gl() {
        let compositor = LoopbackCompositor::new();
        let backend = HeadlessBackend::new();
        let mut device = VideoDevice::init(
            &Bootstrap::new(),
            &compositor.connector(),
            &config("SHMIF_BRIDGE_TEST_VIDEO_HINT"),
            Box::new(backend.clone()),
        )
        .unwrap();
        device
            .create_window(WindowId(1), 100, 100, WindowFlags::resizable())
            .unwrap();
        device.gl_create_context(WindowId(1)).unwrap();
        assert_eq!(backend.framebuffer_binds(), 1);

        compositor.send_primary(Event::Target(TargetCommand::DisplayHint {
            width: 640,
            height: 360,
            flags: DisplayHintFlags::default(),
        }));
        let outcome = device.pump_events();

        assert!(outcome.events.contains(&ToolkitEvent::Window {
            window: WindowId(1),
            event: WindowEvent::Resized {
                width: 640,
                height: 360,
            },
        }));
        assert_eq!(outcome.resized, vec![(SegmentId::Primary, 640, 360)]);
        assert_eq!(backend.framebuffer_binds(), 2);
    }

    #[test]
    fn test_quit_detaches() {
        let compositor = LoopbackCompositor::new();
        let mut device = device(&compositor, "SHMIF_BRIDGE_TEST_VIDEO_QUIT");
        device
            .create_window(WindowId(1), 100, 100, WindowFlags::default())
            .unwrap();
        device.gl_create_context(WindowId(1)).unwrap();

        assert_eq!(device.quit(), Detach::Closed);
        assert_eq!(compositor.live_segments(), 0);
    }
}
