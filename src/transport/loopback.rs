//! In-process loopback compositor
//!
//! Segments are backed by anonymous shared mappings and receive events over
//! crossbeam channels. The [`LoopbackCompositor`] handle plays the server
//! side: it answers segment requests according to a policy, injects events,
//! records everything the client sends and can sever the connection.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use memmap2::MmapMut;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{AudioRing, BufferHints, Connector, Result, Segment, Signal, TransportError};
use crate::protocol::{Event, ExternalEvent, SegmentKind, TargetCommand, VIDEO_PIXEL_BYTES};

/// Initial primary width
pub const DEFAULT_WIDTH: u32 = 640;

/// Initial primary height
pub const DEFAULT_HEIGHT: u32 = 480;

/// Audio buffer size before any hint is applied
pub const DEFAULT_AUDIO_BUFFER: usize = 4096;

/// How segment requests are answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestPolicy {
    /// Answer with NEWSEGMENT immediately
    #[default]
    Accept,
    /// Answer with REQFAIL immediately
    Reject,
    /// Hold until [`LoopbackCompositor::respond`]
    Defer,
}

/// How resizes are answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Apply every resize
    #[default]
    Accept,
    /// Refuse every resize
    Refuse,
}

/// Server-side view of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Loopback segment id
    pub id: u32,
    /// Segment kind
    pub kind: SegmentKind,
    /// Current width
    pub width: u32,
    /// Current height
    pub height: u32,
    /// Current audio buffer size
    pub audio_buffer: usize,
    /// Video signals raised so far
    pub video_signals: usize,
}

#[derive(Debug)]
struct Peer {
    sender: Sender<Event>,
    info: SegmentInfo,
}

#[derive(Debug, Clone, Copy)]
struct SegmentRequest {
    parent: u32,
    kind: SegmentKind,
    width: u32,
    height: u32,
    tag: u32,
}

#[derive(Debug)]
struct CompositorState {
    connected: bool,
    accepting: bool,
    request_policy: RequestPolicy,
    resize_policy: ResizePolicy,
    audio_clamp: Option<usize>,
    initial_size: (u32, u32),
    next_id: u32,
    primary: Option<u32>,
    peers: BTreeMap<u32, Peer>,
    deferred: Vec<SegmentRequest>,
    offers: BTreeMap<u32, VecDeque<SegmentRequest>>,
    outbound: Vec<(u32, ExternalEvent)>,
    audio: Vec<u8>,
    audio_signals: usize,
    opened: usize,
}

impl CompositorState {
    fn new(width: u32, height: u32) -> Self {
        Self {
            connected: true,
            accepting: true,
            request_policy: RequestPolicy::default(),
            resize_policy: ResizePolicy::default(),
            audio_clamp: None,
            initial_size: (width, height),
            next_id: 1,
            primary: None,
            peers: BTreeMap::new(),
            deferred: Vec::new(),
            offers: BTreeMap::new(),
            outbound: Vec::new(),
            audio: Vec::new(),
            audio_signals: 0,
            opened: 0,
        }
    }

    fn register(&mut self, kind: SegmentKind, width: u32, height: u32) -> (u32, Receiver<Event>) {
        let id = self.next_id;
        self.next_id += 1;
        let (sender, receiver) = unbounded();
        self.peers.insert(
            id,
            Peer {
                sender,
                info: SegmentInfo {
                    id,
                    kind,
                    width,
                    height,
                    audio_buffer: DEFAULT_AUDIO_BUFFER,
                    video_signals: 0,
                },
            },
        );
        (id, receiver)
    }

    fn deliver(&self, segment: u32, event: Event) -> bool {
        match self.peers.get(&segment) {
            Some(peer) => peer.sender.send(event).is_ok(),
            None => false,
        }
    }

    fn answer(&mut self, request: SegmentRequest, accept: bool) -> bool {
        let event = if accept {
            self.offers.entry(request.parent).or_default().push_back(request);
            TargetCommand::NewSegment {
                kind: request.kind,
                tag: request.tag,
            }
        } else {
            TargetCommand::RequestFailed { tag: request.tag }
        };
        self.deliver(request.parent, Event::Target(event))
    }
}

/// Server-side handle of the loopback compositor
#[derive(Debug, Clone)]
pub struct LoopbackCompositor {
    state: Arc<Mutex<CompositorState>>,
}

impl Default for LoopbackCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackCompositor {
    /// Create a compositor handing out 640x480 primaries
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Create a compositor handing out primaries of the given size
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(CompositorState::new(width, height))),
        }
    }

    /// Connector bound to this compositor
    pub fn connector(&self) -> LoopbackConnector {
        LoopbackConnector {
            state: Arc::clone(&self.state),
        }
    }

    /// Set how segment requests are answered
    pub fn set_request_policy(&self, policy: RequestPolicy) {
        self.state.lock().request_policy = policy;
    }

    /// Set how resizes are answered
    pub fn set_resize_policy(&self, policy: ResizePolicy) {
        self.state.lock().resize_policy = policy;
    }

    /// Cap the audio buffer size granted by extended resizes
    pub fn clamp_audio_buffer(&self, limit: Option<usize>) {
        self.state.lock().audio_clamp = limit;
    }

    /// Accept or refuse new connections
    pub fn set_accepting(&self, accepting: bool) {
        self.state.lock().accepting = accepting;
    }

    /// Id of the current primary segment
    pub fn primary(&self) -> Option<u32> {
        self.state.lock().primary
    }

    /// Ids of all mapped segments, primary first
    pub fn segments(&self) -> Vec<u32> {
        self.state.lock().peers.keys().copied().collect()
    }

    /// Server-side view of a segment
    pub fn segment(&self, id: u32) -> Option<SegmentInfo> {
        self.state.lock().peers.get(&id).map(|peer| peer.info)
    }

    /// Number of mapped segments
    pub fn live_segments(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Number of primaries opened over the compositor's lifetime
    pub fn connections_opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Inject an event into a segment's queue
    pub fn send(&self, segment: u32, event: Event) -> bool {
        self.state.lock().deliver(segment, event)
    }

    /// Inject an event into the primary's queue
    pub fn send_primary(&self, event: Event) -> bool {
        let state = self.state.lock();
        match state.primary {
            Some(primary) => state.deliver(primary, event),
            None => false,
        }
    }

    /// Offer a segment the client did not ask for
    pub fn push_segment(&self, kind: SegmentKind, width: u32, height: u32) -> bool {
        let mut state = self.state.lock();
        let Some(parent) = state.primary else {
            return false;
        };
        state.answer(
            SegmentRequest {
                parent,
                kind,
                width,
                height,
                tag: 0,
            },
            true,
        )
    }

    /// Answer a deferred segment request
    pub fn respond(&self, tag: u32, accept: bool) -> bool {
        let mut state = self.state.lock();
        let Some(position) = state.deferred.iter().position(|r| r.tag == tag) else {
            return false;
        };
        let request = state.deferred.remove(position);
        state.answer(request, accept)
    }

    /// Tags of requests waiting for [`respond`](Self::respond)
    pub fn deferred_requests(&self) -> Vec<u32> {
        self.state.lock().deferred.iter().map(|r| r.tag).collect()
    }

    /// Drop the connection; every segment operation fails afterwards
    pub fn sever(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        debug!("Loopback connection severed");
    }

    /// Drain everything the client has enqueued
    pub fn take_outbound(&self) -> Vec<(u32, ExternalEvent)> {
        std::mem::take(&mut self.state.lock().outbound)
    }

    /// Drain all signalled audio bytes
    pub fn take_audio(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().audio)
    }

    /// Number of audio signals raised
    pub fn audio_signals(&self) -> usize {
        self.state.lock().audio_signals
    }
}

/// Client-side connector for a [`LoopbackCompositor`]
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    state: Arc<Mutex<CompositorState>>,
}

impl Connector for LoopbackConnector {
    fn open_primary(&self, kind: SegmentKind) -> Result<Box<dyn Segment>> {
        let (id, receiver, width, height) = {
            let mut state = self.state.lock();
            if !state.accepting {
                return Err(TransportError::ConnectionFailed(
                    "compositor is not accepting connections".to_string(),
                ));
            }
            let (width, height) = state.initial_size;
            let (id, receiver) = state.register(kind, width, height);
            state.primary = Some(id);
            state.connected = true;
            state.opened += 1;
            (id, receiver, width, height)
        };
        debug!("Loopback primary {} opened ({}x{})", id, width, height);
        let segment =
            LoopbackSegment::map(id, kind, width, height, receiver, Arc::clone(&self.state))?;
        Ok(Box::new(segment))
    }
}

/// Client-side loopback segment
#[derive(Debug)]
pub struct LoopbackSegment {
    id: u32,
    kind: SegmentKind,
    width: u32,
    height: u32,
    receiver: Receiver<Event>,
    state: Arc<Mutex<CompositorState>>,
    memory: MmapMut,
    video_len: usize,
    audio_len: usize,
    audio_used: usize,
}

fn map_memory(video_len: usize, audio_len: usize) -> Result<MmapMut> {
    Ok(MmapMut::map_anon((video_len + audio_len).max(1))?)
}

fn video_bytes(width: u32, height: u32) -> usize {
    width as usize * height as usize * VIDEO_PIXEL_BYTES
}

impl LoopbackSegment {
    fn map(
        id: u32,
        kind: SegmentKind,
        width: u32,
        height: u32,
        receiver: Receiver<Event>,
        state: Arc<Mutex<CompositorState>>,
    ) -> Result<Self> {
        let video_len = video_bytes(width, height);
        let memory = match map_memory(video_len, DEFAULT_AUDIO_BUFFER) {
            Ok(memory) => memory,
            Err(e) => {
                state.lock().peers.remove(&id);
                return Err(e);
            }
        };
        Ok(Self {
            id,
            kind,
            width,
            height,
            receiver,
            state,
            memory,
            video_len,
            audio_len: DEFAULT_AUDIO_BUFFER,
            audio_used: 0,
        })
    }

    /// Loopback segment id
    pub fn id(&self) -> u32 {
        self.id
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state.lock().connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }

    fn remap(&mut self, width: u32, height: u32, audio_len: usize) -> Result<()> {
        let video_len = video_bytes(width, height);
        if video_len != self.video_len || audio_len != self.audio_len {
            self.memory = map_memory(video_len, audio_len)?;
            self.video_len = video_len;
            self.audio_len = audio_len;
            self.audio_used = 0;
        }
        self.width = width;
        self.height = height;

        let mut state = self.state.lock();
        if let Some(peer) = state.peers.get_mut(&self.id) {
            peer.info.width = width;
            peer.info.height = height;
            peer.info.audio_buffer = audio_len;
        }
        Ok(())
    }

    fn check_resize(&self, width: u32, height: u32) -> Result<()> {
        let state = self.state.lock();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        if state.resize_policy == ResizePolicy::Refuse || width == 0 || height == 0 {
            return Err(TransportError::ResizeRefused(width, height));
        }
        Ok(())
    }
}

impl Segment for LoopbackSegment {
    fn kind(&self) -> SegmentKind {
        self.kind
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn poll(&mut self) -> Result<Option<Event>> {
        self.ensure_connected()?;
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    fn enqueue(&mut self, event: ExternalEvent) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        trace!("Loopback segment {} enqueued {:?}", self.id, event);

        if let ExternalEvent::SegmentRequest {
            kind,
            width,
            height,
            tag,
        } = event
        {
            let request = SegmentRequest {
                parent: self.id,
                kind,
                width,
                height,
                tag,
            };
            match state.request_policy {
                RequestPolicy::Accept => {
                    state.answer(request, true);
                }
                RequestPolicy::Reject => {
                    state.answer(request, false);
                }
                RequestPolicy::Defer => state.deferred.push(request),
            }
        }
        state.outbound.push((self.id, event));
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.check_resize(width, height)?;
        self.remap(width, height, self.audio_len)
    }

    fn resize_ext(&mut self, width: u32, height: u32, hints: BufferHints) -> Result<()> {
        self.check_resize(width, height)?;
        let clamp = self.state.lock().audio_clamp;
        let mut audio_len = hints.audio_buffer_size.unwrap_or(self.audio_len);
        if let Some(limit) = clamp {
            audio_len = audio_len.min(limit);
        }
        self.remap(width, height, audio_len)
    }

    fn audio_ring(&mut self) -> AudioRing<'_> {
        let start = self.video_len;
        let end = start + self.audio_len;
        AudioRing {
            buffer: &mut self.memory[start..end],
            used: &mut self.audio_used,
        }
    }

    fn video_buffer(&mut self) -> &mut [u8] {
        &mut self.memory[..self.video_len]
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        match signal {
            Signal::Audio => {
                let start = self.video_len;
                let end = start + self.audio_used.min(self.audio_len);
                state.audio.extend_from_slice(&self.memory[start..end]);
                state.audio_signals += 1;
            }
            Signal::Video => {
                if let Some(peer) = state.peers.get_mut(&self.id) {
                    peer.info.video_signals += 1;
                }
            }
        }
        Ok(())
    }

    fn accept(&mut self, kind: SegmentKind) -> Result<Box<dyn Segment>> {
        let (id, receiver, width, height) = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(TransportError::Disconnected);
            }
            let offer = state
                .offers
                .get_mut(&self.id)
                .and_then(|queue| queue.pop_front())
                .ok_or_else(|| {
                    TransportError::SegmentUnavailable(format!("no {} segment offered", kind))
                })?;
            if offer.kind != kind {
                return Err(TransportError::SegmentUnavailable(format!(
                    "offered {} but {} was accepted",
                    offer.kind, kind
                )));
            }
            let (id, receiver) = state.register(kind, offer.width, offer.height);
            (id, receiver, offer.width, offer.height)
        };
        debug!("Loopback segment {} mapped as {} ({}x{})", id, kind, width, height);
        let segment =
            LoopbackSegment::map(id, kind, width, height, receiver, Arc::clone(&self.state))?;
        Ok(Box::new(segment))
    }
}

impl Drop for LoopbackSegment {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.peers.remove(&self.id);
        state.offers.remove(&self.id);
        if state.primary == Some(self.id) {
            state.primary = None;
        }
        trace!("Loopback segment {} unmapped", self.id);
    }
}
