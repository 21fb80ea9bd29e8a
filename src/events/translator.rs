//! Event translator
//!
//! One [`EventTranslator::pump`] call is one poll cycle:
//!
//! 1. **Idle**: replay events parked by segment negotiations, oldest first
//! 2. **Draining**: drain the primary, then every live secondary segment in
//!    slot order, each bounded by the per-segment event budget
//! 3. **Flushing**: emit the aggregated mouse motion if one is pending
//!
//! The caller holds the connection lock for the whole cycle, so a resize
//! triggered by a display hint never races the audio path.

use tracing::{debug, trace, warn};

use super::keyboard::Keymap;
use super::mouse::{axis_base, button_event, Axis, MouseAggregation};
use super::toolkit::{ToolkitEvent, WindowEvent};
use crate::connection::{ConnectionState, DisplayGeometry};
use crate::protocol::{
    mouse_axis, DeviceKind, DisplayHintFlag, DisplayHintFlags, Event, InputData, IoEvent,
    ResetLevel, SegmentKind, TargetCommand,
};
use crate::transport::Segment;
use crate::types::{SegmentId, WindowFlags, WindowId};

/// Translator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles, replaying parked events
    Idle,
    /// Reading live segment queues
    Draining,
    /// Emitting aggregated motion
    Flushing,
}

/// Protocol input the bridge recognised but does not translate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unhandled {
    /// Touch sample
    Touch {
        /// Source device
        device: u16,
    },
    /// Game controller sample
    Game {
        /// Source device
        device: u16,
    },
    /// Reset request
    Reset(ResetLevel),
    /// Focus or visibility change from a display hint
    DisplayState {
        /// Source segment
        segment: SegmentId,
        /// Hint bits
        flags: DisplayHintFlags,
    },
    /// Device node handover
    DeviceNode,
    /// Binary chunk offer
    BChunkIn,
    /// Segment pushed without a request
    UnrequestedSegment(SegmentKind),
}

/// Result of one poll cycle
#[derive(Debug, Default)]
pub struct PumpOutcome {
    /// Events for the toolkit, in order
    pub events: Vec<ToolkitEvent>,
    /// Recognised but untranslated input
    pub unhandled: Vec<Unhandled>,
    /// Segments resized by display hints, with their new dimensions
    pub resized: Vec<(SegmentId, u32, u32)>,
    /// Parked events replayed
    pub replayed: usize,
    /// Live events drained
    pub drained: usize,
    /// The connection failed while draining
    pub lost: bool,
}

struct Target<'a> {
    segment: &'a mut dyn Segment,
    id: SegmentId,
    window: Option<WindowId>,
    flags: WindowFlags,
}

struct Cycle<'a> {
    mouse: &'a mut MouseAggregation,
    display: &'a mut DisplayGeometry,
    relative_mode: bool,
    outcome: PumpOutcome,
}

/// Protocol to toolkit event translator
#[derive(Debug)]
pub struct EventTranslator {
    keymap: Keymap,
    budget: usize,
    phase: Phase,
}

impl EventTranslator {
    /// Create a translator draining at most `budget` events per segment and cycle
    pub fn new(keymap: Keymap, budget: usize) -> Self {
        Self {
            keymap,
            budget: budget.max(1),
            phase: Phase::Idle,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one poll cycle over every segment of the connection
    pub fn pump(&mut self, state: &mut ConnectionState) -> PumpOutcome {
        let Some(primary) = state.primary.as_deref_mut() else {
            return PumpOutcome::default();
        };
        let (window, flags) = match state.main_window {
            Some(main) => (Some(main.window), main.flags),
            None => (None, WindowFlags::default()),
        };
        let mut primary = Target {
            segment: primary,
            id: SegmentId::Primary,
            window,
            flags,
        };
        let mut cycle = Cycle {
            mouse: &mut state.mouse,
            display: &mut state.display,
            relative_mode: state.relative_mode,
            outcome: PumpOutcome::default(),
        };

        self.phase = Phase::Idle;
        for event in state.pending.take() {
            cycle.outcome.replayed += 1;
            self.dispatch(event, &mut primary, &mut cycle);
        }

        self.phase = Phase::Draining;
        if !self.drain(&mut primary, &mut cycle) {
            cycle.outcome.lost = true;
        }

        if !cycle.outcome.lost {
            for (slot, entry) in state.registry.live_mut() {
                let mut target = Target {
                    segment: entry.segment.as_mut(),
                    id: SegmentId::Slot(slot),
                    window: Some(entry.window),
                    flags: entry.flags,
                };
                if !self.drain(&mut target, &mut cycle) {
                    cycle.outcome.lost = true;
                    break;
                }
            }
        }

        self.phase = Phase::Flushing;
        if let Some(motion) = cycle.mouse.flush() {
            cycle.outcome.events.push(motion);
        }
        self.phase = Phase::Idle;

        let outcome = cycle.outcome;
        if outcome.lost && !state.lost {
            warn!("Connection lost while pumping events");
            state.lost = true;
        }
        if outcome.drained > 0 || outcome.replayed > 0 {
            trace!(
                "Pumped {} live + {} replayed event(s) into {} toolkit event(s)",
                outcome.drained,
                outcome.replayed,
                outcome.events.len()
            );
        }
        outcome
    }

    /// Drain one segment; `false` if the connection failed
    fn drain(&self, target: &mut Target<'_>, cycle: &mut Cycle<'_>) -> bool {
        for _ in 0..self.budget {
            match target.segment.poll() {
                Ok(Some(event)) => {
                    cycle.outcome.drained += 1;
                    self.dispatch(event, target, cycle);
                }
                Ok(None) => return true,
                Err(e) => {
                    warn!("Polling {} failed: {}", target.id, e);
                    if let Some(window) = target.window {
                        cycle.outcome.events.push(ToolkitEvent::Window {
                            window,
                            event: WindowEvent::Close,
                        });
                    }
                    return false;
                }
            }
        }
        trace!("Event budget exhausted on {}", target.id);
        true
    }

    fn dispatch(&self, event: Event, target: &mut Target<'_>, cycle: &mut Cycle<'_>) {
        match event {
            Event::Io(io) => self.dispatch_io(io, target, cycle),
            Event::Target(command) => dispatch_target(command, target, cycle),
        }
    }

    fn dispatch_io(&self, io: IoEvent, target: &Target<'_>, cycle: &mut Cycle<'_>) {
        let window = target.window;
        match (io.kind, io.input) {
            (DeviceKind::Mouse, InputData::Analog(sample)) => {
                let base = axis_base(cycle.relative_mode, &sample);
                let relative = cycle.relative_mode;
                match io.subid {
                    mouse_axis::MERGED => {
                        if let Some(motion) = cycle.mouse.flush() {
                            cycle.outcome.events.push(motion);
                        }
                        let x = sample.axes[base] as i32;
                        let y = sample.axes[base + 2] as i32;
                        let motion = cycle.mouse.merged(window, io.device, relative, x, y);
                        cycle.outcome.events.push(motion);
                    }
                    mouse_axis::X | mouse_axis::Y => {
                        let axis = if io.subid == mouse_axis::X {
                            Axis::X
                        } else {
                            Axis::Y
                        };
                        let value = sample.axes[base] as i32;
                        if let Some(motion) =
                            cycle.mouse.accumulate(window, io.device, axis, relative, value)
                        {
                            cycle.outcome.events.push(motion);
                        }
                    }
                    other => trace!("Ignoring analog mouse subid {}", other),
                }
            }
            (DeviceKind::Mouse, InputData::Digital(button)) => {
                if let Some(motion) = cycle.mouse.flush() {
                    cycle.outcome.events.push(motion);
                }
                if let Some(event) = button_event(window, io.device, io.subid, button.active) {
                    cycle.outcome.events.push(event);
                }
            }
            (DeviceKind::Keyboard, InputData::Translated(key)) => {
                if key.active {
                    if let Some(text) = key.text() {
                        cycle.outcome.events.push(ToolkitEvent::TextInput {
                            window,
                            text: text.to_string(),
                        });
                    }
                }
                cycle.outcome.events.push(ToolkitEvent::Key {
                    window,
                    pressed: key.active,
                    scancode: self.keymap.translate(key.scancode),
                });
            }
            (DeviceKind::Touch, _) => {
                cycle.outcome.unhandled.push(Unhandled::Touch { device: io.device });
            }
            (DeviceKind::Game, _) => {
                cycle.outcome.unhandled.push(Unhandled::Game { device: io.device });
            }
            (kind, input) => trace!("Ignoring {:?} input {:?}", kind, input),
        }
    }
}

fn dispatch_target(command: TargetCommand, target: &mut Target<'_>, cycle: &mut Cycle<'_>) {
    match command {
        TargetCommand::Exit => {
            if let Some(window) = target.window {
                cycle.outcome.events.push(ToolkitEvent::Window {
                    window,
                    event: WindowEvent::Close,
                });
            }
        }
        TargetCommand::DisplayHint {
            width,
            height,
            flags,
        } => display_hint(width, height, flags, target, cycle),
        TargetCommand::OutputHint {
            width,
            height,
            rate,
        } => {
            if width > 0 && height > 0 {
                cycle.display.width = width;
                cycle.display.height = height;
            }
            if rate > 0 {
                cycle.display.rate = rate;
            }
            debug!("Display geometry now {:?}", cycle.display);
        }
        TargetCommand::Reset(level) => {
            cycle.outcome.unhandled.push(Unhandled::Reset(level));
        }
        TargetCommand::DeviceNode => cycle.outcome.unhandled.push(Unhandled::DeviceNode),
        TargetCommand::BChunkIn => cycle.outcome.unhandled.push(Unhandled::BChunkIn),
        TargetCommand::NewSegment { kind, tag } => {
            debug!("Ignoring unrequested {} segment (tag 0x{:04X})", kind, tag);
            cycle
                .outcome
                .unhandled
                .push(Unhandled::UnrequestedSegment(kind));
        }
        TargetCommand::RequestFailed { tag } => {
            debug!("Ignoring stale request failure (tag 0x{:04X})", tag);
        }
        TargetCommand::StepFrame | TargetCommand::FontHint | TargetCommand::Attenuate => {}
    }
}

fn display_hint(
    width: u32,
    height: u32,
    flags: DisplayHintFlags,
    target: &mut Target<'_>,
    cycle: &mut Cycle<'_>,
) {
    if !flags.is_empty() && !flags.contains(DisplayHintFlag::Ignore) {
        cycle.outcome.unhandled.push(Unhandled::DisplayState {
            segment: target.id,
            flags,
        });
    }

    if width == 0 || height == 0 || target.segment.size() == (width, height) {
        return;
    }
    if !target.flags.resizable {
        trace!("Display hint {}x{} for fixed-size {}", width, height, target.id);
        return;
    }

    match target.segment.resize(width, height) {
        Ok(()) => {
            debug!("{} resized to {}x{}", target.id, width, height);
            cycle.outcome.resized.push((target.id, width, height));
            if let Some(window) = target.window {
                cycle.outcome.events.push(ToolkitEvent::Window {
                    window,
                    event: WindowEvent::Resized { width, height },
                });
            }
        }
        Err(e) => debug!("{} keeps its size: {}", target.id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::keyboard::keycodes;
    use crate::events::toolkit::{MouseButton, Scancode};
    use crate::protocol::mouse_button;
    use crate::transport::loopback::{LoopbackCompositor, ResizePolicy};
    use crate::transport::Connector;

    fn setup(compositor: &LoopbackCompositor, resizable: bool) -> ConnectionState {
        let primary = compositor.connector().open_primary(SegmentKind::Game).unwrap();
        let mut state = ConnectionState::new(primary);
        let flags = WindowFlags {
            resizable,
            hidden: false,
        };
        state.bind_main_window(WindowId(1), flags);
        state
    }

    fn translator() -> EventTranslator {
        EventTranslator::new(Keymap::default(), 512)
    }

    #[test]
    fn test_split_axes_flush_before_button() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        state.relative_mode = true;

        compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, true, 3)));
        compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::Y, true, -2)));
        compositor.send_primary(Event::Io(IoEvent::mouse_button(0, mouse_button::LEFT, true)));

        let outcome = translator().pump(&mut state);
        assert_eq!(
            outcome.events,
            vec![
                ToolkitEvent::MouseMotion {
                    window: Some(WindowId(1)),
                    device: 0,
                    relative: true,
                    x: 3,
                    y: -2,
                },
                ToolkitEvent::MouseButton {
                    window: Some(WindowId(1)),
                    device: 0,
                    button: MouseButton::Left,
                    pressed: true,
                },
            ]
        );
    }

    #[test]
    fn test_end_of_cycle_flush() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);

        compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, false, 40)));
        compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::Y, false, 30)));

        let mut translator = translator();
        let outcome = translator.pump(&mut state);
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(
            outcome.events[0],
            ToolkitEvent::MouseMotion { relative: false, x: 40, y: 30, .. }
        ));
        assert!(!state.mouse().is_dirty());
        assert_eq!(translator.phase(), Phase::Idle);
    }

    #[test]
    fn test_merged_axes_emit_directly() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);

        compositor.send_primary(Event::Io(IoEvent::mouse_merged(2, false, 10, 20)));
        let outcome = translator().pump(&mut state);
        assert_eq!(
            outcome.events,
            vec![ToolkitEvent::MouseMotion {
                window: Some(WindowId(1)),
                device: 2,
                relative: false,
                x: 10,
                y: 20,
            }]
        );
    }

    #[test]
    fn test_alternate_representation_used_on_mode_mismatch() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        state.relative_mode = true;

        let mut sample = IoEvent::mouse_merged(0, false, 100, 200);
        if let InputData::Analog(analog) = &mut sample.input {
            analog.axes = [100, 4, 200, -6];
        }
        compositor.send_primary(Event::Io(sample));

        let outcome = translator().pump(&mut state);
        assert!(matches!(
            outcome.events[0],
            ToolkitEvent::MouseMotion { relative: true, x: 4, y: -6, .. }
        ));
    }

    #[test]
    fn test_pending_replayed_before_live() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);

        state
            .pending
            .push(Event::Io(IoEvent::key(0, keycodes::KEY_A, true, "a")));
        compositor.send_primary(Event::Io(IoEvent::key(0, keycodes::KEY_B, true, "")));

        let outcome = translator().pump(&mut state);
        assert_eq!(outcome.replayed, 1);
        assert_eq!(outcome.drained, 1);
        assert_eq!(
            outcome.events,
            vec![
                ToolkitEvent::TextInput {
                    window: Some(WindowId(1)),
                    text: "a".to_string(),
                },
                ToolkitEvent::Key {
                    window: Some(WindowId(1)),
                    pressed: true,
                    scancode: Scancode(4),
                },
                ToolkitEvent::Key {
                    window: Some(WindowId(1)),
                    pressed: true,
                    scancode: Scancode(5),
                },
            ]
        );
        assert_eq!(state.pending_len(), 0);

        let outcome = translator().pump(&mut state);
        assert_eq!(outcome.replayed, 0);
    }

    #[test]
    fn test_key_release_has_no_text() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        compositor.send_primary(Event::Io(IoEvent::key(0, keycodes::KEY_A, false, "a")));

        let outcome = translator().pump(&mut state);
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(
            outcome.events[0],
            ToolkitEvent::Key { pressed: false, .. }
        ));
    }

    #[test]
    fn test_display_hint_resizes_resizable_window() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, true);

        compositor.send_primary(Event::Target(TargetCommand::DisplayHint {
            width: 1024,
            height: 768,
            flags: DisplayHintFlag::Ignore | DisplayHintFlag::Unfocused,
        }));
        let outcome = translator().pump(&mut state);

        assert_eq!(outcome.resized, vec![(SegmentId::Primary, 1024, 768)]);
        assert_eq!(
            outcome.events,
            vec![ToolkitEvent::Window {
                window: WindowId(1),
                event: WindowEvent::Resized {
                    width: 1024,
                    height: 768,
                },
            }]
        );
        assert!(outcome.unhandled.is_empty());
    }

    #[test]
    fn test_refused_resize_emits_nothing() {
        let compositor = LoopbackCompositor::new();
        compositor.set_resize_policy(ResizePolicy::Refuse);
        let mut state = setup(&compositor, true);

        compositor.send_primary(Event::Target(TargetCommand::DisplayHint {
            width: 1024,
            height: 768,
            flags: DisplayHintFlags::default(),
        }));
        let outcome = translator().pump(&mut state);
        assert!(outcome.events.is_empty());
        assert!(outcome.resized.is_empty());
    }

    #[test]
    fn test_fixed_window_ignores_display_hint() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        compositor.send_primary(Event::Target(TargetCommand::DisplayHint {
            width: 300,
            height: 300,
            flags: DisplayHintFlag::Unfocused.into(),
        }));

        let outcome = translator().pump(&mut state);
        assert!(outcome.resized.is_empty());
        assert_eq!(
            outcome.unhandled,
            vec![Unhandled::DisplayState {
                segment: SegmentId::Primary,
                flags: DisplayHintFlag::Unfocused.into(),
            }]
        );
    }

    #[test]
    fn test_exit_and_output_hint() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        compositor.send_primary(Event::Target(TargetCommand::OutputHint {
            width: 1920,
            height: 1080,
            rate: 60,
        }));
        compositor.send_primary(Event::Target(TargetCommand::Exit));

        let outcome = translator().pump(&mut state);
        assert_eq!(
            state.display(),
            DisplayGeometry {
                width: 1920,
                height: 1080,
                rate: 60,
            }
        );
        assert_eq!(
            outcome.events,
            vec![ToolkitEvent::Window {
                window: WindowId(1),
                event: WindowEvent::Close,
            }]
        );
    }

    #[test]
    fn test_unimplemented_inputs_are_recorded() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        compositor.send_primary(Event::Target(TargetCommand::Reset(ResetLevel::Hard)));
        compositor.send_primary(Event::Target(TargetCommand::FontHint));
        compositor.send_primary(Event::Io(IoEvent {
            device: 3,
            subid: 0,
            kind: DeviceKind::Game,
            input: InputData::Digital(crate::protocol::DigitalInput { active: true }),
        }));

        let outcome = translator().pump(&mut state);
        assert!(outcome.events.is_empty());
        assert_eq!(
            outcome.unhandled,
            vec![Unhandled::Reset(ResetLevel::Hard), Unhandled::Game { device: 3 }]
        );
    }

    #[test]
    fn test_budget_bounds_drain() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        for _ in 0..5 {
            compositor.send_primary(Event::Target(TargetCommand::StepFrame));
        }

        let mut translator = EventTranslator::new(Keymap::default(), 2);
        assert_eq!(translator.pump(&mut state).drained, 2);
        assert_eq!(translator.pump(&mut state).drained, 2);
        assert_eq!(translator.pump(&mut state).drained, 1);
    }

    #[test]
    fn test_secondary_events_target_their_window() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        let slot = state
            .request_window(64, 64, WindowId(7), WindowFlags::default())
            .unwrap();
        let secondary = *compositor.segments().last().unwrap();

        compositor.send(secondary, Event::Target(TargetCommand::Exit));
        let outcome = translator().pump(&mut state);
        assert_eq!(
            outcome.events,
            vec![ToolkitEvent::Window {
                window: WindowId(7),
                event: WindowEvent::Close,
            }]
        );
        assert!(state.registry().get(slot).is_some());
    }

    #[test]
    fn test_lost_connection_requests_close() {
        let compositor = LoopbackCompositor::new();
        let mut state = setup(&compositor, false);
        compositor.sever();

        let outcome = translator().pump(&mut state);
        assert!(outcome.lost);
        assert!(state.is_lost());
        assert_eq!(
            outcome.events,
            vec![ToolkitEvent::Window {
                window: WindowId(1),
                event: WindowEvent::Close,
            }]
        );
    }
}
