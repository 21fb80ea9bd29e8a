//! shmif-probe
//!
//! Runs a loopback session through the bridge end to end: video init, two
//! windows, a GL context, audio playback and a burst of injected input, then
//! logs what the toolkit side would have received.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use shmif_bridge::audio::AudioDevice;
use shmif_bridge::config::{Config, LoggingConfig};
use shmif_bridge::connection::Bootstrap;
use shmif_bridge::cursor::SystemCursor;
use shmif_bridge::driver::{AudioDriver, VideoDriver, BOOTSTRAP};
use shmif_bridge::events::keyboard::keycodes;
use shmif_bridge::gl::HeadlessBackend;
use shmif_bridge::protocol::{mouse_axis, mouse_button, DisplayHintFlags, Event, IoEvent, TargetCommand};
use shmif_bridge::transport::loopback::LoopbackCompositor;
use shmif_bridge::types::{WindowFlags, WindowId};
use shmif_bridge::utils::{format_user_error, log_startup_diagnostics};
use shmif_bridge::video::VideoDevice;

/// Command-line arguments for shmif-probe
#[derive(Parser, Debug)]
#[command(name = "shmif-probe")]
#[command(version, about = "Loopback probe for the shmif toolkit bridge", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SHMIF_PROBE_CONFIG")]
    config: Option<String>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    log_file: Option<String>,

    /// Audio periods to play
    #[arg(long, default_value = "4")]
    periods: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };
    let _guard = init_logging(&config.logging, args.log_file.as_deref())?;

    info!("════════════════════════════════════════════════════════");
    info!("  shmif-probe v{}", env!("CARGO_PKG_VERSION"));
    info!("  Driver: {}", BOOTSTRAP.name);
    info!("════════════════════════════════════════════════════════");
    log_startup_diagnostics(&config);
    debug!("Config: {:?}", config);

    if let Err(e) = run(&config, args.periods) {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default_config(),
    };
    let level = match args.verbose {
        0 => None,
        1 => Some("debug".to_string()),
        _ => Some("trace".to_string()),
    };
    Ok(config.with_overrides(level, args.log_format.clone()))
}

fn run(config: &Config, periods: usize) -> Result<()> {
    let compositor = LoopbackCompositor::new();
    let connector = compositor.connector();
    let bootstrap = Bootstrap::global();

    if std::env::var_os(&config.connection.env_var).is_none() {
        info!("{} not set, pointing it at the loopback compositor", config.connection.env_var);
        std::env::set_var(&config.connection.env_var, "loopback");
    }

    let mut video = VideoDevice::init(bootstrap, &connector, config, Box::new(HeadlessBackend::new()))
        .context("Failed to initialize video device")?;
    let main = WindowId(1);
    let popup = WindowId(2);
    video.create_window(main, 640, 480, WindowFlags::resizable())?;
    video.set_window_title(main, "shmif-probe")?;
    video.create_window(popup, 320, 240, WindowFlags::default())?;

    video.gl_load_library(None)?;
    let context = video.gl_create_context(main)?;
    info!("GL context {:?} current", context);

    let mut audio = AudioDevice::open(bootstrap, &connector, config, false)
        .context("Failed to open audio device")?;
    info!("Shared connection refs: {}", video.connection().refs());

    let cursor = video.create_system_cursor(SystemCursor::Hand);
    video.show_cursor(Some(&cursor))?;
    video.warp_mouse(Some(main), 100, 100)?;

    for event in [
        Event::Io(IoEvent::mouse_axis(0, mouse_axis::X, true, 3)),
        Event::Io(IoEvent::mouse_axis(0, mouse_axis::Y, true, -2)),
        Event::Io(IoEvent::mouse_button(0, mouse_button::LEFT, true)),
        Event::Io(IoEvent::mouse_button(0, mouse_button::WHEEL_DOWN, true)),
        Event::Io(IoEvent::key(1, keycodes::KEY_A, true, "a")),
        Event::Target(TargetCommand::DisplayHint {
            width: 800,
            height: 600,
            flags: DisplayHintFlags::default(),
        }),
        Event::Target(TargetCommand::OutputHint {
            width: 1920,
            height: 1080,
            rate: 60,
        }),
    ] {
        compositor.send_primary(event);
    }

    let outcome = video.pump_events();
    info!(
        "Pump: {} event(s) from {} drained, {} replayed",
        outcome.events.len(),
        outcome.drained,
        outcome.replayed
    );
    for event in &outcome.events {
        info!("  {:?}", event);
    }
    for unhandled in &outcome.unhandled {
        warn!("  unhandled: {:?}", unhandled);
    }
    info!("Display bounds: {:?}", video.display_bounds());

    for period in 0..periods {
        let buffer = audio.get_buffer();
        for (i, sample) in buffer.chunks_exact_mut(2).enumerate() {
            let value = (((i + period) % 64) as i16 - 32) * 512;
            sample.copy_from_slice(&value.to_le_bytes());
        }
        let stats = audio.play()?;
        debug!("Period {}: {:?}", period, stats);
    }
    let totals = audio.totals();
    info!(
        "Audio: {} bytes in {} chunk(s), {} signal(s), {} bytes delivered",
        totals.bytes,
        totals.copies,
        totals.signals,
        compositor.take_audio().len()
    );

    video.gl_swap_window(main)?;
    video.destroy_window(popup)?;

    info!("Audio detach: {:?}", audio.close());
    info!("Video detach: {:?}", video.quit());
    info!(
        "Connections opened {}, closed {}",
        bootstrap.connections_opened(),
        bootstrap.connections_closed()
    );
    Ok(())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(format: &str, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ => layer.pretty().boxed(),
    }
}

fn init_logging(logging: &LoggingConfig, log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    use std::fs::File;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "shmif_bridge={level},shmif_probe={level},warn",
            level = logging.level
        ))
    });

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(&logging.format, std::io::stdout, true)];
    let mut guard = None;

    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file {}", path))?;
        layers.push(fmt_layer(&logging.format, file, false));
    } else if let Some(dir) = &logging.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "shmif-probe.log");
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(&logging.format, writer, false));
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(path) = log_file {
        info!("Logging to file: {}", path);
    }
    Ok(guard)
}
