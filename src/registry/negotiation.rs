//! Segment request negotiation
//!
//! A request is sent once and then polled in passes. Each pass drains the
//! primary event queue until it is empty or the matching response shows up.
//! Events that are not the response are parked in a [`PendingQueue`] so the
//! event translator can replay them later, in arrival order, exactly once.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use super::error::{Result, SegmentError};
use crate::protocol::{Event, ExternalEvent, SegmentKind, TargetCommand};
use crate::transport::Segment;

/// Events received while a negotiation was running
#[derive(Debug, Default)]
pub struct PendingQueue {
    events: VecDeque<Event>,
}

impl PendingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an event
    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Number of parked events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// No parked events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every parked event, leaving the queue empty
    pub fn take(&mut self) -> VecDeque<Event> {
        std::mem::take(&mut self.events)
    }
}

/// An outstanding segment request
#[derive(Debug, Clone)]
pub struct Negotiation {
    kind: SegmentKind,
    width: u32,
    height: u32,
    tag: u32,
    passes: u32,
}

impl Negotiation {
    /// Enqueue a segment request on the primary
    pub fn send(
        primary: &mut dyn Segment,
        kind: SegmentKind,
        width: u32,
        height: u32,
        tag: u32,
    ) -> Result<Self> {
        primary
            .enqueue(ExternalEvent::SegmentRequest {
                kind,
                width,
                height,
                tag,
            })
            .map_err(|e| SegmentError::ProtocolInconsistent(e.to_string()))?;
        debug!(
            "Requested {} segment {}x{} (tag 0x{:04X})",
            kind, width, height, tag
        );
        Ok(Self {
            kind,
            width,
            height,
            tag,
            passes: 0,
        })
    }

    /// Correlation tag
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Requested kind
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Requested dimensions
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Poll passes run so far
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Run one drain pass over the primary
    ///
    /// Returns the mapped segment on NEWSEGMENT, `Ok(None)` when the queue ran
    /// dry without an answer.
    pub fn poll_pass(
        &mut self,
        primary: &mut dyn Segment,
        pending: &mut PendingQueue,
    ) -> Result<Option<Box<dyn Segment>>> {
        self.passes += 1;
        loop {
            let event = match primary.poll() {
                Ok(Some(event)) => event,
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!("Connection lost during segment negotiation: {}", e);
                    return Err(SegmentError::ProtocolInconsistent(e.to_string()));
                }
            };

            match event {
                Event::Target(TargetCommand::NewSegment { kind, tag }) if tag == self.tag => {
                    let segment = primary.accept(kind).map_err(|e| {
                        SegmentError::ProtocolInconsistent(format!(
                            "failed to map offered segment: {}",
                            e
                        ))
                    })?;
                    debug!(
                        "Segment request 0x{:04X} accepted after {} pass(es)",
                        self.tag, self.passes
                    );
                    return Ok(Some(segment));
                }
                Event::Target(TargetCommand::RequestFailed { tag }) if tag == self.tag => {
                    debug!("Segment request 0x{:04X} rejected", self.tag);
                    return Err(SegmentError::SegmentRejected { tag });
                }
                other => {
                    trace!("Parking event during negotiation: {:?}", other);
                    pending.push(other);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::IoEvent;
    use crate::transport::loopback::{LoopbackCompositor, RequestPolicy};
    use crate::transport::Connector;

    #[test]
    fn test_unrelated_events_are_parked_in_order() {
        let compositor = LoopbackCompositor::new();
        compositor.set_request_policy(RequestPolicy::Defer);
        let mut primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        let mut pending = PendingQueue::new();

        let mut request =
            Negotiation::send(primary.as_mut(), SegmentKind::Application, 64, 64, 0xA000)
                .unwrap();

        compositor.send_primary(Event::Io(IoEvent::mouse_button(0, 1, true)));
        compositor.send_primary(Event::Target(TargetCommand::StepFrame));
        assert!(request.poll_pass(primary.as_mut(), &mut pending).unwrap().is_none());
        assert_eq!(pending.len(), 2);

        compositor.respond(0xA000, true);
        let segment = request.poll_pass(primary.as_mut(), &mut pending).unwrap();
        assert!(segment.is_some());
        assert_eq!(request.passes(), 2);

        let parked: Vec<Event> = pending.take().into_iter().collect();
        assert_eq!(parked[0], Event::Io(IoEvent::mouse_button(0, 1, true)));
        assert_eq!(parked[1], Event::Target(TargetCommand::StepFrame));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_foreign_tag_response_is_parked() {
        let compositor = LoopbackCompositor::new();
        compositor.set_request_policy(RequestPolicy::Defer);
        let mut primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        let mut pending = PendingQueue::new();

        let mut request =
            Negotiation::send(primary.as_mut(), SegmentKind::Application, 64, 64, 0xA001)
                .unwrap();
        compositor.send_primary(Event::Target(TargetCommand::RequestFailed { tag: 0xA005 }));

        assert!(request.poll_pass(primary.as_mut(), &mut pending).unwrap().is_none());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_rejection() {
        let compositor = LoopbackCompositor::new();
        compositor.set_request_policy(RequestPolicy::Reject);
        let mut primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        let mut pending = PendingQueue::new();

        let mut request =
            Negotiation::send(primary.as_mut(), SegmentKind::Cursor, 16, 16, 0xC000).unwrap();
        let result = request.poll_pass(primary.as_mut(), &mut pending);
        assert!(matches!(
            result,
            Err(SegmentError::SegmentRejected { tag: 0xC000 })
        ));
    }

    #[test]
    fn test_disconnect_is_inconsistent() {
        let compositor = LoopbackCompositor::new();
        compositor.set_request_policy(RequestPolicy::Defer);
        let mut primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        let mut pending = PendingQueue::new();

        let mut request =
            Negotiation::send(primary.as_mut(), SegmentKind::Application, 8, 8, 0xA000).unwrap();
        compositor.sever();
        assert!(matches!(
            request.poll_pass(primary.as_mut(), &mut pending),
            Err(SegmentError::ProtocolInconsistent(_))
        ));
    }
}
