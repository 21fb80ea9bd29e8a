//! Connection bootstrap
//!
//! Audio and video initialize independently but must share one primary
//! connection. [`Bootstrap`] holds the process-wide slot for it:
//! the first subsystem to call [`Bootstrap::ensure_primary`] opens the primary
//! segment, later callers attach to the existing one. Every successful call
//! returns an [`Attachment`]; the connection is torn down when the last
//! attachment is detached or dropped.
//!
//! # Lock order
//!
//! Bootstrap slot first, then the connection state. Nothing takes the slot
//! while holding the state lock.

pub mod error;
pub mod state;

pub use error::{classify_error, ConnectError, Result};
pub use state::{ConnectionState, DisplayGeometry, MainWindow, RELATIVE_CURSOR_HINT};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::protocol::SegmentKind;
use crate::registry::{self, Negotiation, SegmentError};
use crate::transport::{Connector, Segment};
use crate::types::{SlotIndex, WindowFlags, WindowId};

/// The shared primary connection
#[derive(Debug)]
pub struct SharedConnection {
    state: Mutex<ConnectionState>,
}

impl SharedConnection {
    fn new(primary: Box<dyn Segment>) -> Self {
        Self {
            state: Mutex::new(ConnectionState::new(primary)),
        }
    }

    /// Lock the connection state
    pub fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock()
    }

    /// Subsystems currently attached
    pub fn refs(&self) -> usize {
        self.state.lock().refs
    }

    /// Request a window segment, releasing the lock between poll passes
    pub fn request_window(
        &self,
        width: u32,
        height: u32,
        window: WindowId,
        flags: WindowFlags,
        poll_interval: Duration,
    ) -> registry::Result<SlotIndex> {
        self.lock()
            .begin_window_request(width, height, window, flags)?;
        loop {
            if let Some(slot) = self.lock().poll_window_request()? {
                return Ok(slot);
            }
            std::thread::sleep(poll_interval);
        }
    }

    /// Negotiate a segment that is not bound to a slot
    ///
    /// Used for the cursor segment. Parked events land in the shared pending
    /// queue like window negotiations.
    pub fn negotiate(
        &self,
        kind: SegmentKind,
        width: u32,
        height: u32,
        tag: u32,
        poll_interval: Duration,
    ) -> registry::Result<Box<dyn Segment>> {
        let mut negotiation = {
            let mut guard = self.lock();
            if guard.lost {
                return Err(SegmentError::ProtocolInconsistent(
                    "connection lost".to_string(),
                ));
            }
            let primary = guard.primary_mut().ok_or(SegmentError::NotConnected)?;
            Negotiation::send(primary, kind, width, height, tag)?
        };

        loop {
            {
                let mut guard = self.lock();
                let state = &mut *guard;
                let primary = state
                    .primary
                    .as_deref_mut()
                    .ok_or(SegmentError::NotConnected)?;
                match negotiation.poll_pass(primary, &mut state.pending) {
                    Ok(Some(segment)) => return Ok(segment),
                    Ok(None) => {}
                    Err(e) => {
                        if matches!(e, SegmentError::ProtocolInconsistent(_)) {
                            state.lost = true;
                        }
                        return Err(e);
                    }
                }
            }
            std::thread::sleep(poll_interval);
        }
    }
}

#[derive(Debug, Default)]
struct BootstrapInner {
    slot: Mutex<Option<Arc<SharedConnection>>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Owner of the process-wide primary connection slot
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    inner: Arc<BootstrapInner>,
}

static GLOBAL_BOOTSTRAP: OnceLock<Bootstrap> = OnceLock::new();

impl Bootstrap {
    /// Create an empty bootstrap
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide bootstrap used by the driver entry points
    pub fn global() -> &'static Bootstrap {
        GLOBAL_BOOTSTRAP.get_or_init(Bootstrap::new)
    }

    /// Attach to the primary connection, opening it if absent
    ///
    /// Opening happens at most once per connection lifetime; the reference
    /// count is raised under the state lock before the attachment is handed
    /// out.
    pub fn ensure_primary(&self, connector: &dyn Connector, kind: SegmentKind) -> Result<Attachment> {
        let mut slot = self.inner.slot.lock();

        let connection = match slot.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                let primary = connector
                    .open_primary(kind)
                    .map_err(|e| ConnectError::ConnectionUnavailable(e.to_string()))?;
                let (width, height) = primary.size();
                let connection = Arc::new(SharedConnection::new(primary));
                *slot = Some(Arc::clone(&connection));
                self.inner.opened.fetch_add(1, Ordering::Relaxed);
                info!("Primary {} segment connected ({}x{})", kind, width, height);
                connection
            }
        };

        let refs = {
            let mut state = connection.lock();
            if state.lost {
                warn!("Attaching to a connection that was lost");
            }
            state.refs += 1;
            state.refs
        };
        debug!("Attached to primary connection (refs={})", refs);

        Ok(Attachment {
            bootstrap: self.clone(),
            connection,
            released: false,
        })
    }

    /// Current shared connection, if any
    pub fn current(&self) -> Option<Arc<SharedConnection>> {
        self.inner.slot.lock().clone()
    }

    /// Primaries opened over this bootstrap's lifetime
    pub fn connections_opened(&self) -> usize {
        self.inner.opened.load(Ordering::Relaxed)
    }

    /// Primaries torn down over this bootstrap's lifetime
    pub fn connections_closed(&self) -> usize {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

/// Result of detaching from the shared connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// Other subsystems are still attached
    Remaining(usize),
    /// This was the last owner; the connection was torn down
    Closed,
}

/// One subsystem's hold on the shared connection
#[derive(Debug)]
pub struct Attachment {
    bootstrap: Bootstrap,
    connection: Arc<SharedConnection>,
    released: bool,
}

impl Attachment {
    /// The shared connection
    pub fn connection(&self) -> &Arc<SharedConnection> {
        &self.connection
    }

    /// Give up this hold; the last owner tears the connection down
    pub fn detach(mut self) -> Detach {
        self.release().unwrap_or(Detach::Closed)
    }

    fn release(&mut self) -> Option<Detach> {
        if self.released {
            return None;
        }
        self.released = true;

        let mut slot = self.bootstrap.inner.slot.lock();
        let mut state = self.connection.lock();
        debug_assert!(state.refs > 0, "detach without matching attach");
        state.refs = state.refs.saturating_sub(1);
        if state.refs > 0 {
            debug!("Detached from primary connection (refs={})", state.refs);
            return Some(Detach::Remaining(state.refs));
        }

        state.teardown();
        drop(state);
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.connection))
        {
            *slot = None;
        }
        self.bootstrap.inner.closed.fetch_add(1, Ordering::Relaxed);
        info!("Primary connection closed by last owner");
        Some(Detach::Closed)
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackCompositor;
    use crate::transport::{MockConnector, TransportError};

    #[test]
    fn test_second_attach_reuses_connection() {
        let compositor = LoopbackCompositor::new();
        let connector = compositor.connector();
        let bootstrap = Bootstrap::new();

        let audio = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();
        let video = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();

        assert!(Arc::ptr_eq(audio.connection(), video.connection()));
        assert_eq!(audio.connection().refs(), 2);
        assert_eq!(compositor.connections_opened(), 1);
        assert_eq!(bootstrap.connections_opened(), 1);
    }

    #[test]
    fn test_last_owner_tears_down() {
        let compositor = LoopbackCompositor::new();
        let connector = compositor.connector();
        let bootstrap = Bootstrap::new();

        let audio = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();
        let video = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();

        assert_eq!(audio.detach(), Detach::Remaining(1));
        assert_eq!(compositor.live_segments(), 1);
        assert!(bootstrap.current().is_some());

        assert_eq!(video.detach(), Detach::Closed);
        assert_eq!(compositor.live_segments(), 0);
        assert!(bootstrap.current().is_none());
        assert_eq!(bootstrap.connections_closed(), 1);
    }

    #[test]
    fn test_drop_detaches() {
        let compositor = LoopbackCompositor::new();
        let connector = compositor.connector();
        let bootstrap = Bootstrap::new();

        {
            let _attachment = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();
            assert_eq!(compositor.live_segments(), 1);
        }
        assert_eq!(compositor.live_segments(), 0);
        assert!(bootstrap.current().is_none());
    }

    #[test]
    fn test_reopen_after_close() {
        let compositor = LoopbackCompositor::new();
        let connector = compositor.connector();
        let bootstrap = Bootstrap::new();

        bootstrap
            .ensure_primary(&connector, SegmentKind::Game)
            .unwrap()
            .detach();
        let again = bootstrap.ensure_primary(&connector, SegmentKind::Game).unwrap();

        assert_eq!(again.connection().refs(), 1);
        assert_eq!(bootstrap.connections_opened(), 2);
    }

    #[test]
    fn test_connect_failure_leaves_slot_empty() {
        let mut connector = MockConnector::new();
        connector
            .expect_open_primary()
            .times(1)
            .returning(|_| Err(TransportError::ConnectionFailed("refused".into())));
        let bootstrap = Bootstrap::new();

        let result = bootstrap.ensure_primary(&connector, SegmentKind::Game);
        assert!(matches!(result, Err(ConnectError::ConnectionUnavailable(_))));
        assert!(bootstrap.current().is_none());
    }

    #[test]
    fn test_concurrent_attach_opens_once() {
        let compositor = LoopbackCompositor::new();
        let connector = compositor.connector();
        let bootstrap = Bootstrap::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bootstrap = bootstrap.clone();
                let connector = connector.clone();
                std::thread::spawn(move || {
                    bootstrap
                        .ensure_primary(&connector, SegmentKind::Game)
                        .unwrap()
                })
            })
            .collect();
        let attachments: Vec<Attachment> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(compositor.connections_opened(), 1);
        assert_eq!(attachments[0].connection().refs(), 8);

        drop(attachments);
        assert_eq!(compositor.live_segments(), 0);
        assert_eq!(bootstrap.connections_closed(), 1);
    }
}
