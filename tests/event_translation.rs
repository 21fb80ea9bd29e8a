//! Event translation integration tests
//!
//! Compositor events are injected on the loopback side and pumped through
//! the video device.

use shmif_bridge::config::Config;
use shmif_bridge::connection::Bootstrap;
use shmif_bridge::driver::VideoDriver;
use shmif_bridge::events::{MouseButton, ToolkitEvent, Unhandled, WindowEvent};
use shmif_bridge::gl::HeadlessBackend;
use shmif_bridge::protocol::{
    mouse_axis, mouse_button, DisplayHintFlag, Event, IoEvent, TargetCommand,
};
use shmif_bridge::transport::loopback::LoopbackCompositor;
use shmif_bridge::types::{SegmentId, WindowFlags, WindowId};
use shmif_bridge::video::VideoDevice;

const MAIN: WindowId = WindowId(1);
const POPUP: WindowId = WindowId(2);

fn device(compositor: &LoopbackCompositor, env_var: &str) -> VideoDevice {
    std::env::set_var(env_var, "loopback");
    let mut config = Config::default_config();
    config.connection.env_var = env_var.to_string();
    let mut video = VideoDevice::init(
        &Bootstrap::new(),
        &compositor.connector(),
        &config,
        Box::new(HeadlessBackend::new()),
    )
    .unwrap();
    video
        .create_window(MAIN, 320, 240, WindowFlags::resizable())
        .unwrap();
    video
}

fn secondary_id(compositor: &LoopbackCompositor) -> u32 {
    let primary = compositor.primary().unwrap();
    compositor
        .segments()
        .into_iter()
        .find(|id| *id != primary)
        .unwrap()
}

fn display_hint(width: u32, height: u32) -> Event {
    Event::Target(TargetCommand::DisplayHint {
        width,
        height,
        flags: DisplayHintFlag::Ignore.into(),
    })
}

#[test]
fn test_split_axes_aggregate_before_button() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_SPLIT");

    compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, false, 100)));
    compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::Y, false, 50)));
    compositor.send_primary(Event::Io(IoEvent::mouse_button(0, mouse_button::LEFT, true)));
    compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, false, 120)));

    let outcome = video.pump_events();
    assert_eq!(outcome.drained, 4);
    assert_eq!(
        outcome.events,
        vec![
            ToolkitEvent::MouseMotion {
                window: Some(MAIN),
                device: 0,
                relative: false,
                x: 100,
                y: 50,
            },
            ToolkitEvent::MouseButton {
                window: Some(MAIN),
                device: 0,
                button: MouseButton::Left,
                pressed: true,
            },
            ToolkitEvent::MouseMotion {
                window: Some(MAIN),
                device: 0,
                relative: false,
                x: 120,
                y: 50,
            },
        ]
    );
    assert_eq!(video.global_mouse_state(), (120, 50));
}

#[test]
fn test_merged_sample_flushes_pending_axis() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_MERGED");

    compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, false, 10)));
    compositor.send_primary(Event::Io(IoEvent::mouse_merged(0, false, 5, 6)));

    let outcome = video.pump_events();
    assert_eq!(
        outcome.events,
        vec![
            ToolkitEvent::MouseMotion {
                window: Some(MAIN),
                device: 0,
                relative: false,
                x: 10,
                y: 0,
            },
            ToolkitEvent::MouseMotion {
                window: Some(MAIN),
                device: 0,
                relative: false,
                x: 5,
                y: 6,
            },
        ]
    );
}

#[test]
fn test_relative_mode_sums_deltas() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_RELATIVE");
    video.set_relative_mouse_mode(true).unwrap();

    for (axis, value) in [(mouse_axis::X, 2), (mouse_axis::X, 3), (mouse_axis::Y, -4)] {
        compositor.send_primary(Event::Io(IoEvent::mouse_axis(0, axis, true, value)));
    }

    let outcome = video.pump_events();
    assert_eq!(
        outcome.events,
        vec![ToolkitEvent::MouseMotion {
            window: Some(MAIN),
            device: 0,
            relative: true,
            x: 5,
            y: -4,
        }]
    );
}

#[test]
fn test_display_hint_resizes_resizable_window() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_RESIZE");

    compositor.send_primary(display_hint(800, 600));
    let outcome = video.pump_events();

    assert_eq!(outcome.resized, vec![(SegmentId::Primary, 800, 600)]);
    assert_eq!(
        outcome.events,
        vec![ToolkitEvent::Window {
            window: MAIN,
            event: WindowEvent::Resized {
                width: 800,
                height: 600,
            },
        }]
    );
    let primary = compositor.primary().unwrap();
    assert_eq!(compositor.segment(primary).unwrap().width, 800);
}

#[test]
fn test_display_hint_with_unchanged_size() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_UNCHANGED");

    compositor.send_primary(display_hint(320, 240));
    compositor.send_primary(display_hint(0, 0));
    let outcome = video.pump_events();

    assert_eq!(outcome.drained, 2);
    assert!(outcome.resized.is_empty());
    assert!(outcome.events.is_empty());
}

#[test]
fn test_display_hint_on_fixed_size_window() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_FIXED");
    video
        .create_window(POPUP, 64, 64, WindowFlags::default())
        .unwrap();
    let popup = secondary_id(&compositor);

    compositor.send(popup, display_hint(128, 128));
    let outcome = video.pump_events();

    assert!(outcome.resized.is_empty());
    assert!(outcome.events.is_empty());
    assert_eq!(compositor.segment(popup).unwrap().width, 64);
}

#[test]
fn test_display_state_bits_are_reported() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_STATE");

    compositor.send_primary(Event::Target(TargetCommand::DisplayHint {
        width: 0,
        height: 0,
        flags: DisplayHintFlag::Unfocused.into(),
    }));
    let outcome = video.pump_events();

    assert_eq!(
        outcome.unhandled,
        vec![Unhandled::DisplayState {
            segment: SegmentId::Primary,
            flags: DisplayHintFlag::Unfocused.into(),
        }]
    );
}

#[test]
fn test_secondary_events_target_their_window() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_SECONDARY");
    video
        .create_window(POPUP, 64, 64, WindowFlags::default())
        .unwrap();
    let popup = secondary_id(&compositor);

    compositor.send_primary(Event::Io(IoEvent::mouse_button(0, mouse_button::WHEEL_UP, true)));
    compositor.send(popup, Event::Target(TargetCommand::Exit));
    let outcome = video.pump_events();

    assert_eq!(
        outcome.events,
        vec![
            ToolkitEvent::MouseWheel {
                window: Some(MAIN),
                device: 0,
                x: 0,
                y: -1,
            },
            ToolkitEvent::Window {
                window: POPUP,
                event: WindowEvent::Close,
            },
        ]
    );
}

#[test]
fn test_severed_connection_closes_main_window() {
    let compositor = LoopbackCompositor::new();
    let mut video = device(&compositor, "SHMIF_BRIDGE_IT_EVENTS_SEVER");

    compositor.sever();
    let outcome = video.pump_events();

    assert!(outcome.lost);
    assert_eq!(
        outcome.events,
        vec![ToolkitEvent::Window {
            window: MAIN,
            event: WindowEvent::Close,
        }]
    );
    assert!(video.connection().lock().is_lost());
}
