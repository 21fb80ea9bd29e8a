//! Audio transfer integration tests
//!
//! Playback runs on its own thread while the video side resizes the primary
//! with new audio buffer hints; both go through the connection lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shmif_bridge::audio::{AudioDevice, AudioError};
use shmif_bridge::config::Config;
use shmif_bridge::connection::Bootstrap;
use shmif_bridge::driver::AudioDriver;
use shmif_bridge::protocol::AUDIO_FRAME_BYTES;
use shmif_bridge::transport::loopback::LoopbackCompositor;
use shmif_bridge::transport::BufferHints;

fn config(env_var: &str, samples: u16) -> Config {
    std::env::set_var(env_var, "loopback");
    let mut config = Config::default_config();
    config.connection.env_var = env_var.to_string();
    config.audio.samples = samples;
    config
}

#[test]
fn test_period_reaches_compositor_in_order() {
    let compositor = LoopbackCompositor::new();
    let bootstrap = Bootstrap::new();
    let config = config("SHMIF_BRIDGE_IT_AUDIO_ORDER", 256);
    let mut audio = AudioDevice::open(&bootstrap, &compositor.connector(), &config, false).unwrap();

    let period = audio.spec().period_bytes;
    assert_eq!(period, 256 * AUDIO_FRAME_BYTES);
    let primary = compositor.primary().unwrap();
    assert_eq!(compositor.segment(primary).unwrap().audio_buffer, period);

    for round in 0..3u8 {
        audio.get_buffer().fill(round + 1);
        let stats = audio.play().unwrap();
        assert_eq!(stats.bytes, period);
        assert_eq!(stats.signals, 1);
    }

    let delivered = compositor.take_audio();
    assert_eq!(delivered.len(), 3 * period);
    assert!(delivered[..period].iter().all(|b| *b == 1));
    assert!(delivered[2 * period..].iter().all(|b| *b == 3));
    audio.close();
}

#[test]
fn test_clamped_ring_splits_period() {
    let compositor = LoopbackCompositor::new();
    compositor.clamp_audio_buffer(Some(1000));
    let bootstrap = Bootstrap::new();
    let config = config("SHMIF_BRIDGE_IT_AUDIO_CLAMP", 1024);
    let mut audio = AudioDevice::open(&bootstrap, &compositor.connector(), &config, false).unwrap();

    let stats = audio.play().unwrap();
    assert_eq!(stats.bytes, 4096);
    assert_eq!(stats.copies, 5);
    assert_eq!(stats.signals, 4);
    assert_eq!(compositor.take_audio().len(), 4000);
    audio.close();
}

#[test]
fn test_play_during_concurrent_resize() {
    let compositor = LoopbackCompositor::new();
    let bootstrap = Bootstrap::new();
    let config = config("SHMIF_BRIDGE_IT_AUDIO_RESIZE", 512);
    let connector = compositor.connector();
    let mut audio = AudioDevice::open(&bootstrap, &connector, &config, false).unwrap();
    let video_side = bootstrap.ensure_primary(&connector, config.primary_kind()).unwrap();
    let period = audio.spec().period_bytes;
    let done = Arc::new(AtomicBool::new(false));

    let resizer = {
        let connection = Arc::clone(video_side.connection());
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let sizes = [(320, 240, 700), (640, 480, 3000), (160, 120, 128)];
            let mut resizes = 0usize;
            while !done.load(Ordering::Acquire) {
                let (width, height, audio_size) = sizes[resizes % sizes.len()];
                let mut state = connection.lock();
                if let Some(primary) = state.primary_mut() {
                    let hints = BufferHints {
                        audio_buffer_size: Some(audio_size),
                        ..BufferHints::default()
                    };
                    primary.resize_ext(width, height, hints).unwrap();
                    resizes += 1;
                }
                drop(state);
                std::thread::yield_now();
            }
            resizes
        })
    };

    let player = std::thread::spawn(move || {
        let mut total = 0;
        for round in 0..200usize {
            audio.get_buffer().fill((round % 251) as u8);
            total += audio.play().unwrap().bytes;
        }
        (audio, total)
    });

    let (audio, total) = player.join().unwrap();
    done.store(true, Ordering::Release);
    let resizes = resizer.join().unwrap();

    assert_eq!(total, 200 * period);
    assert_eq!(audio.totals().bytes, total);
    assert!(resizes > 0);
    assert!(compositor.take_audio().len() <= total);

    audio.close();
    video_side.detach();
    assert_eq!(compositor.live_segments(), 0);
}

#[test]
fn test_capture_is_refused() {
    let compositor = LoopbackCompositor::new();
    let bootstrap = Bootstrap::new();
    let config = config("SHMIF_BRIDGE_IT_AUDIO_CAPTURE", 512);

    let result = AudioDevice::open(&bootstrap, &compositor.connector(), &config, true);
    assert!(matches!(result, Err(AudioError::CaptureUnsupported)));
    assert!(bootstrap.current().is_none());
}
