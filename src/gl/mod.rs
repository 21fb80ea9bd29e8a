//! GL context bridge
//!
//! Maps toolkit GL contexts onto accelerated segments. Each segment gets a
//! built-in context from [`AcceleratedBackend::setup`] on first use; further
//! contexts are created alongside it and swapped in on demand.
//!
//! # Context handles
//!
//! ```text
//! ContextHandle { segment, index }
//!   index 1   built-in context, survives delete (only marked dead)
//!   index 2.. additional contexts, released on delete
//! ```
//!
//! Making a context current also points the default framebuffer at the
//! segment's FBO through [`FramebufferRedirect`].
//!
//! Callers pass the locked [`ConnectionState`]; the bridge never takes the
//! connection lock itself.

pub mod backend;
pub mod error;
pub mod redirect;

pub use backend::{AcceleratedBackend, ContextConfig, HeadlessBackend, RawContext};
pub use error::{classify_error, GlError, Result};
pub use redirect::{bind_framebuffer, FramebufferRedirect, RedirectTarget};

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GlConfig;
use crate::connection::ConnectionState;
use crate::types::SegmentId;

/// Index of the built-in context of a segment
pub const BUILTIN_CONTEXT: u32 = 1;

/// Toolkit-visible GL context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    /// Segment the context renders to
    pub segment: SegmentId,
    /// Context index on that segment
    pub index: u32,
}

impl ContextHandle {
    /// Handle of a segment's built-in context
    pub fn builtin(segment: SegmentId) -> Self {
        Self {
            segment,
            index: BUILTIN_CONTEXT,
        }
    }

    /// Whether this is the built-in context
    pub fn is_builtin(&self) -> bool {
        self.index == BUILTIN_CONTEXT
    }
}

#[derive(Debug)]
struct SegmentContexts {
    builtin: RawContext,
    builtin_live: bool,
    active: u32,
    extra: Vec<(u32, RawContext)>,
    next_index: u32,
}

impl SegmentContexts {
    fn new(builtin: RawContext) -> Self {
        Self {
            builtin,
            builtin_live: true,
            active: BUILTIN_CONTEXT,
            extra: Vec::new(),
            next_index: BUILTIN_CONTEXT + 1,
        }
    }

    fn raw(&self, index: u32) -> Option<RawContext> {
        if index == BUILTIN_CONTEXT {
            return self.builtin_live.then_some(self.builtin);
        }
        self.extra
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, raw)| *raw)
    }

    fn live(&self) -> usize {
        usize::from(self.builtin_live) + self.extra.len()
    }
}

/// GL context bridge
pub struct GlBridge {
    backend: Box<dyn AcceleratedBackend>,
    config: ContextConfig,
    builtin_only: bool,
    library: Option<std::path::PathBuf>,
    library_loaded: bool,
    records: HashMap<SegmentId, SegmentContexts>,
    current: Option<ContextHandle>,
    redirect: Arc<FramebufferRedirect>,
}

impl std::fmt::Debug for GlBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBridge")
            .field("config", &self.config)
            .field("builtin_only", &self.builtin_only)
            .field("library_loaded", &self.library_loaded)
            .field("segments", &self.records.len())
            .field("current", &self.current)
            .finish()
    }
}

impl GlBridge {
    /// Create a bridge using the process-wide framebuffer redirect
    pub fn new(backend: Box<dyn AcceleratedBackend>, config: &GlConfig) -> Self {
        Self::with_redirect(backend, config, FramebufferRedirect::global())
    }

    /// Create a bridge with its own redirect
    pub fn with_redirect(
        backend: Box<dyn AcceleratedBackend>,
        config: &GlConfig,
        redirect: Arc<FramebufferRedirect>,
    ) -> Self {
        Self {
            backend,
            config: ContextConfig::from(config),
            builtin_only: config.builtin_only,
            library: config.library.clone(),
            library_loaded: false,
            records: HashMap::new(),
            current: None,
            redirect,
        }
    }

    /// Context currently bound
    pub fn current(&self) -> Option<ContextHandle> {
        self.current
    }

    /// Framebuffer redirect this bridge drives
    pub fn redirect(&self) -> &Arc<FramebufferRedirect> {
        &self.redirect
    }

    /// Live contexts on a segment
    pub fn context_count(&self, segment: SegmentId) -> usize {
        self.records.get(&segment).map_or(0, SegmentContexts::live)
    }

    /// Library is loaded
    pub fn is_library_loaded(&self) -> bool {
        self.library_loaded
    }

    /// Load the GL library and install the real framebuffer bind
    ///
    /// `path` overrides the configured library.
    pub fn load_library(&mut self, path: Option<&Path>) -> Result<()> {
        let path = path.or(self.library.as_deref());
        self.backend.load(path)?;

        let backend = &self.backend;
        ::gl::load_with(|symbol| backend.proc_address(symbol));
        self.redirect
            .install(self.backend.proc_address("glBindFramebuffer"));

        self.library_loaded = true;
        info!(
            "GL library loaded ({})",
            path.map_or_else(|| "default".to_string(), |p| p.display().to_string())
        );
        Ok(())
    }

    /// Unload the GL library
    pub fn unload_library(&mut self) {
        if !self.library_loaded {
            return;
        }
        self.redirect.install(std::ptr::null());
        self.backend.unload();
        self.library_loaded = false;
        debug!("GL library unloaded");
    }

    /// Resolve a GL entry point for the toolkit
    ///
    /// Framebuffer binds resolve to the redirecting shim.
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        match name {
            "glBindFramebuffer" | "glBindFramebufferEXT" => {
                bind_framebuffer as redirect::BindFramebufferFn as *const c_void
            }
            _ => self.backend.proc_address(name),
        }
    }

    /// Create a context on a segment and make it current
    ///
    /// The first context on a segment is the built-in one. Deleting it only
    /// marks it dead, so the next create revives it.
    pub fn create_context(
        &mut self,
        state: &mut ConnectionState,
        id: SegmentId,
    ) -> Result<ContextHandle> {
        let segment = state.segment_mut(id).ok_or(GlError::UnknownSegment(id))?;

        let handle = if let Some(record) = self.records.get_mut(&id) {
            if !record.builtin_live {
                record.builtin_live = true;
                ContextHandle::builtin(id)
            } else {
                if self.builtin_only {
                    return Err(GlError::AdditionalContextsDisabled(id));
                }
                let raw = self.backend.create_context(segment, &self.config)?;
                let index = record.next_index;
                record.next_index += 1;
                record.extra.push((index, raw));
                ContextHandle { segment: id, index }
            }
        } else {
            let raw = self.backend.setup(segment, &self.config)?;
            self.records.insert(id, SegmentContexts::new(raw));
            ContextHandle::builtin(id)
        };

        debug!("GL context {} created on {}", handle.index, id);
        self.make_current(state, Some(handle))?;
        Ok(handle)
    }

    /// Bind a context, or release the current one with `None`
    pub fn make_current(
        &mut self,
        state: &mut ConnectionState,
        handle: Option<ContextHandle>,
    ) -> Result<()> {
        let Some(handle) = handle else {
            self.backend.clear_current();
            self.redirect.clear();
            self.current = None;
            return Ok(());
        };

        let record = self
            .records
            .get_mut(&handle.segment)
            .ok_or(GlError::UnknownContext(handle))?;
        let raw = record.raw(handle.index).ok_or(GlError::UnknownContext(handle))?;
        let segment = state
            .segment_mut(handle.segment)
            .ok_or(GlError::UnknownSegment(handle.segment))?;

        if record.active != handle.index {
            self.backend.swap_context(segment, raw)?;
            record.active = handle.index;
        }
        let framebuffer = self.backend.make_current(segment)?;

        self.redirect.set(RedirectTarget {
            segment: handle.segment,
            framebuffer,
        });
        self.current = Some(handle);
        Ok(())
    }

    /// Delete a context
    ///
    /// Deleting the built-in context only clears its live flag.
    pub fn delete_context(
        &mut self,
        state: &mut ConnectionState,
        handle: ContextHandle,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(&handle.segment)
            .ok_or(GlError::UnknownContext(handle))?;

        if handle.is_builtin() {
            if !record.builtin_live {
                return Err(GlError::UnknownContext(handle));
            }
            record.builtin_live = false;
            debug!("GL built-in context on {} marked dead", handle.segment);
            return Ok(());
        }

        let position = record
            .extra
            .iter()
            .position(|(i, _)| *i == handle.index)
            .ok_or(GlError::UnknownContext(handle))?;
        let (_, raw) = record.extra.remove(position);

        if record.active == handle.index {
            if let Some(segment) = state.segment_mut(handle.segment) {
                if let Err(e) = self.backend.swap_context(segment, record.builtin) {
                    warn!("Failed to restore built-in context: {}", e);
                }
            }
            record.active = BUILTIN_CONTEXT;
        }
        self.backend.release_context(raw);

        if self.current == Some(handle) {
            self.current = None;
            self.redirect.clear();
        }
        debug!("GL context {} deleted on {}", handle.index, handle.segment);
        Ok(())
    }

    /// Present a segment's framebuffer
    pub fn swap_window(&mut self, state: &mut ConnectionState, id: SegmentId) -> Result<()> {
        let segment = state.segment_mut(id).ok_or(GlError::UnknownSegment(id))?;
        self.backend.present(segment)
    }

    /// Rebind after a resize
    ///
    /// The compositor reallocates the FBO when a segment is resized, so the
    /// redirect target must be refreshed if that segment is current.
    pub fn on_segment_resized(&mut self, state: &mut ConnectionState, id: SegmentId) -> Result<()> {
        let Some(current) = self.current.filter(|c| c.segment == id) else {
            return Ok(());
        };
        let segment = state.segment_mut(id).ok_or(GlError::UnknownSegment(id))?;
        let framebuffer = self.backend.make_current(segment)?;
        self.redirect.set(RedirectTarget {
            segment: current.segment,
            framebuffer,
        });
        debug!("GL framebuffer on {} rebound to {}", id, framebuffer);
        Ok(())
    }

    /// Drop every context on a segment before it is released
    pub fn forget_segment(&mut self, state: &mut ConnectionState, id: SegmentId) {
        let Some(record) = self.records.remove(&id) else {
            return;
        };
        for (_, raw) in record.extra {
            self.backend.release_context(raw);
        }
        if let Some(segment) = state.segment_mut(id) {
            self.backend.teardown(segment);
        }
        if self.current.is_some_and(|c| c.segment == id) {
            self.current = None;
            self.redirect.clear();
            self.backend.clear_current();
        }
        debug!("GL contexts on {} released", id);
    }

    /// Release every context and unload the library
    pub fn shutdown(&mut self, state: &mut ConnectionState) {
        let segments: Vec<SegmentId> = self.records.keys().copied().collect();
        for id in segments {
            self.forget_segment(state, id);
        }
        self.unload_library();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Bootstrap, SharedConnection};
    use crate::protocol::SegmentKind;
    use crate::transport::loopback::LoopbackCompositor;

    struct Fixture {
        compositor: LoopbackCompositor,
        backend: HeadlessBackend,
        bridge: GlBridge,
        _attachment: crate::connection::Attachment,
        connection: Arc<SharedConnection>,
    }

    fn fixture(builtin_only: bool) -> Fixture {
        let compositor = LoopbackCompositor::new();
        let attachment = Bootstrap::new()
            .ensure_primary(&compositor.connector(), SegmentKind::Game)
            .unwrap();
        let connection = Arc::clone(attachment.connection());
        let backend = HeadlessBackend::new();
        let config = GlConfig {
            builtin_only,
            ..GlConfig::default()
        };
        let bridge = GlBridge::with_redirect(
            Box::new(backend.clone()),
            &config,
            Arc::new(FramebufferRedirect::new()),
        );
        Fixture {
            compositor,
            backend,
            bridge,
            _attachment: attachment,
            connection,
        }
    }

    #[test]
    fn test_first_context_is_builtin() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        let handle = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        assert!(handle.is_builtin());
        assert_eq!(f.bridge.current(), Some(handle));
        assert_eq!(f.backend.live_contexts(), 1);

        let target = f.bridge.redirect().target().unwrap();
        assert_eq!(target.segment, SegmentId::Primary);
        assert_eq!(f.bridge.redirect().resolve(0), target.framebuffer);
    }

    #[test]
    fn test_additional_contexts_swap() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        let builtin = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        let extra = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        assert_eq!(extra.index, 2);
        assert_eq!(f.bridge.context_count(SegmentId::Primary), 2);
        assert_eq!(f.backend.current_context(), Some(RawContext(2)));

        f.bridge.make_current(&mut state, Some(builtin)).unwrap();
        assert_eq!(f.backend.current_context(), Some(RawContext(1)));

        f.bridge.delete_context(&mut state, extra).unwrap();
        assert_eq!(f.backend.live_contexts(), 1);
        assert!(matches!(
            f.bridge.make_current(&mut state, Some(extra)),
            Err(GlError::UnknownContext(_))
        ));
    }

    #[test]
    fn test_builtin_only_refuses_extra() {
        let mut f = fixture(true);
        let mut state = f.connection.lock();

        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        assert!(matches!(
            f.bridge.create_context(&mut state, SegmentId::Primary),
            Err(GlError::AdditionalContextsDisabled(SegmentId::Primary))
        ));
    }

    #[test]
    fn test_delete_builtin_marks_dead() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        let builtin = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        f.bridge.delete_context(&mut state, builtin).unwrap();
        assert_eq!(f.bridge.context_count(SegmentId::Primary), 0);
        assert_eq!(f.backend.live_contexts(), 1);

        let revived = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        assert_eq!(revived, builtin);
        assert_eq!(f.backend.live_contexts(), 1);
    }

    #[test]
    fn test_delete_current_extra_clears_redirect() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        let extra = f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        f.bridge.delete_context(&mut state, extra).unwrap();

        assert_eq!(f.bridge.current(), None);
        assert_eq!(f.bridge.redirect().target(), None);
        assert_eq!(f.backend.current_context(), Some(RawContext(1)));
    }

    #[test]
    fn test_unknown_segment() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();
        assert!(matches!(
            f.bridge.create_context(&mut state, SegmentId::Cursor),
            Err(GlError::UnknownSegment(SegmentId::Cursor))
        ));
    }

    #[test]
    fn test_resize_rebinds_current() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        let before = f.bridge.redirect().target().unwrap().framebuffer;
        f.bridge
            .on_segment_resized(&mut state, SegmentId::Primary)
            .unwrap();
        let after = f.bridge.redirect().target().unwrap().framebuffer;
        assert_ne!(before, after);
    }

    #[test]
    fn test_swap_window_signals_video() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        f.bridge.swap_window(&mut state, SegmentId::Primary).unwrap();
        assert_eq!(f.backend.presents(), 1);

        let primary = f.compositor.primary().unwrap();
        assert_eq!(f.compositor.segment(primary).unwrap().video_signals, 1);
    }

    #[test]
    fn test_proc_address_redirects_bind() {
        let f = fixture(false);
        let shim = bind_framebuffer as redirect::BindFramebufferFn as *const c_void;
        assert_eq!(f.bridge.get_proc_address("glBindFramebuffer"), shim);
        assert!(f.bridge.get_proc_address("glClear").is_null());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut f = fixture(false);
        let mut state = f.connection.lock();

        f.bridge.load_library(None).unwrap();
        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();
        f.bridge.create_context(&mut state, SegmentId::Primary).unwrap();

        f.bridge.shutdown(&mut state);
        assert_eq!(f.backend.teardowns(), 1);
        assert_eq!(f.bridge.current(), None);
        assert!(!f.backend.is_loaded());
        assert!(!f.bridge.is_library_loaded());
    }
}
