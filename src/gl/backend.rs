//! Accelerated graphics backend seam
//!
//! [`AcceleratedBackend`] is the compositor-side extension that sets up a
//! GPU context on a segment and hands out offscreen framebuffers.
//! [`HeadlessBackend`] implements it without a GPU: contexts are plain
//! counters and presenting signals the segment's video buffer.

use std::collections::HashSet;
use std::ffi::c_void;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::error::{GlError, Result};
use crate::config::GlConfig;
use crate::transport::{Segment, Signal};

/// Backend-owned context name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawContext(pub u64);

/// Attributes for context setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Depth buffer bits
    pub depth_bits: u8,
    /// Stencil buffer bits
    pub stencil_bits: u8,
}

impl From<&GlConfig> for ContextConfig {
    fn from(config: &GlConfig) -> Self {
        Self {
            major: config.major,
            minor: config.minor,
            depth_bits: config.depth_bits,
            stencil_bits: config.stencil_bits,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::from(&GlConfig::default())
    }
}

/// Compositor-side GPU extension
pub trait AcceleratedBackend: Send {
    /// Load the GL library, platform default when `path` is `None`
    fn load(&mut self, path: Option<&Path>) -> Result<()>;

    /// Unload the GL library
    fn unload(&mut self);

    /// Set up acceleration on a segment; returns its built-in context
    fn setup(&mut self, segment: &mut dyn Segment, config: &ContextConfig) -> Result<RawContext>;

    /// Create an additional context sharing the segment's setup
    fn create_context(
        &mut self,
        segment: &mut dyn Segment,
        config: &ContextConfig,
    ) -> Result<RawContext>;

    /// Swap the segment's active context; returns the previous one
    fn swap_context(
        &mut self,
        segment: &mut dyn Segment,
        context: RawContext,
    ) -> Result<Option<RawContext>>;

    /// Make the segment's active context current; returns its framebuffer
    fn make_current(&mut self, segment: &mut dyn Segment) -> Result<u32>;

    /// Release an additional context
    fn release_context(&mut self, context: RawContext);

    /// Tear down acceleration on a segment
    fn teardown(&mut self, segment: &mut dyn Segment);

    /// Present the segment's framebuffer
    fn present(&mut self, segment: &mut dyn Segment) -> Result<()>;

    /// Resolve a GL entry point; null when unknown
    fn proc_address(&self, name: &str) -> *const c_void;

    /// Release whatever context is current on this thread
    fn clear_current(&mut self);
}

#[derive(Debug, Default)]
struct HeadlessState {
    loaded: bool,
    next_context: u64,
    next_framebuffer: u32,
    live: HashSet<RawContext>,
    current: Option<RawContext>,
    presents: usize,
    teardowns: usize,
}

/// Backend for environments without a GPU
///
/// Clones share state so a caller can inspect what the bridge did.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    /// Create a headless backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Library is loaded
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Contexts not yet released
    pub fn live_contexts(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Last context swapped in
    pub fn current_context(&self) -> Option<RawContext> {
        self.state.lock().current
    }

    /// Framebuffers handed out by `make_current`
    pub fn framebuffer_binds(&self) -> u32 {
        self.state.lock().next_framebuffer
    }

    /// Frames presented
    pub fn presents(&self) -> usize {
        self.state.lock().presents
    }

    /// Segments torn down
    pub fn teardowns(&self) -> usize {
        self.state.lock().teardowns
    }

    fn allocate(&self) -> RawContext {
        let mut state = self.state.lock();
        state.next_context += 1;
        let context = RawContext(state.next_context);
        state.live.insert(context);
        context
    }
}

impl AcceleratedBackend for HeadlessBackend {
    fn load(&mut self, path: Option<&Path>) -> Result<()> {
        debug!("Headless GL load ({:?})", path);
        self.state.lock().loaded = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.state.lock().loaded = false;
    }

    fn setup(&mut self, segment: &mut dyn Segment, config: &ContextConfig) -> Result<RawContext> {
        let (width, height) = segment.size();
        if width == 0 || height == 0 {
            return Err(GlError::ContextCreation(format!(
                "segment has no video buffer ({width}x{height})"
            )));
        }
        debug!(
            "Headless GL {}.{} setup on {}x{}",
            config.major, config.minor, width, height
        );
        let context = self.allocate();
        self.state.lock().current = Some(context);
        Ok(context)
    }

    fn create_context(
        &mut self,
        _segment: &mut dyn Segment,
        _config: &ContextConfig,
    ) -> Result<RawContext> {
        Ok(self.allocate())
    }

    fn swap_context(
        &mut self,
        _segment: &mut dyn Segment,
        context: RawContext,
    ) -> Result<Option<RawContext>> {
        let mut state = self.state.lock();
        if !state.live.contains(&context) {
            return Err(GlError::Backend(format!("context {} not live", context.0)));
        }
        Ok(state.current.replace(context))
    }

    fn make_current(&mut self, _segment: &mut dyn Segment) -> Result<u32> {
        let mut state = self.state.lock();
        if state.current.is_none() {
            return Err(GlError::Backend("no context to make current".to_string()));
        }
        state.next_framebuffer += 1;
        Ok(state.next_framebuffer)
    }

    fn release_context(&mut self, context: RawContext) {
        let mut state = self.state.lock();
        state.live.remove(&context);
        if state.current == Some(context) {
            state.current = None;
        }
    }

    fn teardown(&mut self, _segment: &mut dyn Segment) {
        self.state.lock().teardowns += 1;
    }

    fn present(&mut self, segment: &mut dyn Segment) -> Result<()> {
        segment
            .signal(Signal::Video)
            .map_err(|e| GlError::Backend(e.to_string()))?;
        self.state.lock().presents += 1;
        Ok(())
    }

    fn proc_address(&self, _name: &str) -> *const c_void {
        std::ptr::null()
    }

    fn clear_current(&mut self) {
        self.state.lock().current = None;
    }
}
