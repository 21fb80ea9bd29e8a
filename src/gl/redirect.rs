//! Default framebuffer redirect
//!
//! Applications render to "framebuffer 0" but the compositor hands out an
//! offscreen FBO per segment. The host resolves `glBindFramebuffer` through
//! [`GlBridge::get_proc_address`](super::GlBridge::get_proc_address), which
//! returns [`bind_framebuffer`]; that shim swaps 0 for the FBO of the current
//! context before calling the real entry point.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use ::gl::types::{GLenum, GLuint};
use parking_lot::RwLock;
use tracing::trace;

use crate::types::SegmentId;

/// Signature of the real `glBindFramebuffer`
pub type BindFramebufferFn = unsafe extern "system" fn(GLenum, GLuint);

/// Framebuffer that stands in for the default one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Segment owning the framebuffer
    pub segment: SegmentId,
    /// Compositor-provided FBO name
    pub framebuffer: GLuint,
}

/// Process-wide redirect state
#[derive(Debug, Default)]
pub struct FramebufferRedirect {
    target: RwLock<Option<RedirectTarget>>,
    real: AtomicUsize,
}

static GLOBAL_REDIRECT: OnceLock<Arc<FramebufferRedirect>> = OnceLock::new();

impl FramebufferRedirect {
    /// Create an empty redirect
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirect used by [`bind_framebuffer`]
    pub fn global() -> Arc<FramebufferRedirect> {
        Arc::clone(GLOBAL_REDIRECT.get_or_init(|| Arc::new(FramebufferRedirect::new())))
    }

    /// Point the default framebuffer at `target`
    pub fn set(&self, target: RedirectTarget) {
        trace!("Default framebuffer -> {} on {}", target.framebuffer, target.segment);
        *self.target.write() = Some(target);
    }

    /// Stop redirecting
    pub fn clear(&self) {
        *self.target.write() = None;
    }

    /// Current redirect target
    pub fn target(&self) -> Option<RedirectTarget> {
        *self.target.read()
    }

    /// Framebuffer to actually bind for a requested name
    pub fn resolve(&self, framebuffer: GLuint) -> GLuint {
        if framebuffer != 0 {
            return framebuffer;
        }
        self.target().map_or(0, |t| t.framebuffer)
    }

    /// Install the real `glBindFramebuffer`; null uninstalls
    pub fn install(&self, real: *const c_void) {
        self.real.store(real as usize, Ordering::Release);
    }

    /// Real entry point is installed
    pub fn has_real(&self) -> bool {
        self.real.load(Ordering::Acquire) != 0
    }

    /// Resolve and forward a bind; returns the framebuffer actually bound
    #[allow(unsafe_code)]
    pub fn bind(&self, target: GLenum, framebuffer: GLuint) -> GLuint {
        let resolved = self.resolve(framebuffer);
        let real = self.real.load(Ordering::Acquire);
        if real != 0 {
            // SAFETY: only addresses returned by the GL loader for
            // glBindFramebuffer are installed.
            unsafe {
                let real: BindFramebufferFn = std::mem::transmute::<usize, BindFramebufferFn>(real);
                real(target, resolved);
            }
        }
        resolved
    }
}

/// `glBindFramebuffer` replacement handed to the host
pub extern "system" fn bind_framebuffer(target: GLenum, framebuffer: GLuint) {
    GLOBAL_REDIRECT
        .get_or_init(|| Arc::new(FramebufferRedirect::new()))
        .bind(target, framebuffer);
}
