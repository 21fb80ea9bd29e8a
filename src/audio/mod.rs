//! Audio output
//!
//! An [`AudioDevice`] attaches to the shared primary connection, hints the
//! compositor about its period size and plays mix buffers through
//! [`transfer`]. The format is fixed: stereo, s16le, 48 kHz.
//!
//! # Lifecycle
//!
//! ```text
//! open ──> buffer_mut / play (repeat) ──> close
//!  └─ attaches (refs += 1)                 └─ detaches, last owner tears down
//! ```

pub mod error;
pub mod transfer;

pub use error::{classify_error, AudioError, Result};
pub use transfer::{transfer, TransferStats};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Attachment, Bootstrap, Detach};
use crate::driver::AudioDriver;
use crate::protocol::{AUDIO_CHANNELS, AUDIO_FRAME_BYTES, AUDIO_SAMPLE_RATE};
use crate::transport::{BufferHints, Connector};

/// Silence value for signed 16-bit samples
pub const SILENCE: u8 = 0;

/// Negotiated output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    /// Channel count
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample frames per period
    pub samples: u16,
    /// Bytes per period
    pub period_bytes: usize,
}

impl AudioSpec {
    /// Output format for the configured period size
    pub fn from_config(config: &Config) -> Self {
        let samples = config.audio.samples.max(1);
        Self {
            channels: AUDIO_CHANNELS,
            sample_rate: AUDIO_SAMPLE_RATE,
            samples,
            period_bytes: samples as usize * AUDIO_FRAME_BYTES,
        }
    }

    /// Buffer layout hints for a total ring budget
    pub fn buffer_hints(&self, ring_budget: usize) -> BufferHints {
        BufferHints {
            audio_buffer_size: Some(self.period_bytes),
            audio_buffer_count: Some((ring_budget / self.period_bytes).max(1)),
            video_buffer_count: None,
        }
    }
}

/// Enumerated audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    /// Device name
    pub name: &'static str,
    /// Capture device
    pub capture: bool,
}

/// Devices offered by the bridge: a single default output
pub fn detect_devices() -> Vec<AudioDeviceInfo> {
    vec![AudioDeviceInfo {
        name: "default",
        capture: false,
    }]
}

/// Open audio output device
#[derive(Debug)]
pub struct AudioDevice {
    attachment: Attachment,
    spec: AudioSpec,
    mix: Vec<u8>,
    totals: TransferStats,
}

impl AudioDevice {
    /// Whether the connection environment is present
    pub fn is_available(config: &Config) -> bool {
        std::env::var_os(&config.connection.env_var).is_some()
    }

    /// Open the output device, attaching to the shared connection
    pub fn open(
        bootstrap: &Bootstrap,
        connector: &dyn Connector,
        config: &Config,
        capture: bool,
    ) -> Result<Self> {
        if capture {
            return Err(AudioError::CaptureUnsupported);
        }
        if !Self::is_available(config) {
            return Err(AudioError::EnvironmentMissing(
                config.connection.env_var.clone(),
            ));
        }

        Self::open_with_spec(bootstrap, connector, config, AudioSpec::from_config(config))
    }

    /// Attach and allocate the mix buffer for `spec`
    ///
    /// On allocation failure the attachment is rolled back before returning.
    fn open_with_spec(
        bootstrap: &Bootstrap,
        connector: &dyn Connector,
        config: &Config,
        spec: AudioSpec,
    ) -> Result<Self> {
        let attachment = bootstrap.ensure_primary(connector, config.primary_kind())?;

        let mut mix = Vec::new();
        if mix.try_reserve_exact(spec.period_bytes).is_err() {
            let detach = attachment.detach();
            warn!("Mix buffer allocation failed, rolled back attachment ({:?})", detach);
            return Err(AudioError::OutOfMemory(spec.period_bytes));
        }
        mix.resize(spec.period_bytes, SILENCE);

        {
            let mut state = attachment.connection().lock();
            if let Some(primary) = state.primary_mut() {
                let (width, height) = primary.size();
                let hints = spec.buffer_hints(config.audio.ring_budget);
                if let Err(e) = primary.resize_ext(width, height, hints) {
                    warn!("Compositor refused audio buffer hints: {}", e);
                }
            }
        }

        info!(
            "Audio device opened: {} ch, {} Hz, {} frames per period",
            spec.channels, spec.sample_rate, spec.samples
        );
        Ok(Self {
            attachment,
            spec,
            mix,
            totals: TransferStats::default(),
        })
    }

    /// Output format
    pub fn spec(&self) -> &AudioSpec {
        &self.spec
    }

    /// Mix buffer the toolkit fills before [`play`](Self::play)
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.mix
    }

    /// Push the mix buffer to the compositor
    ///
    /// Without a mapped primary this is a no-op.
    pub fn play(&mut self) -> Result<TransferStats> {
        let mut state = self.attachment.connection().lock();
        let Some(primary) = state.primary_mut() else {
            debug!("No primary segment, dropping audio period");
            return Ok(TransferStats::default());
        };
        let stats = transfer(primary, &self.mix)?;
        self.totals += stats;
        Ok(stats)
    }

    /// Totals since open
    pub fn totals(&self) -> TransferStats {
        self.totals
    }

    /// Close the device and detach from the shared connection
    pub fn close(self) -> Detach {
        info!(
            "Audio device closed after {} bytes, {} signal(s)",
            self.totals.bytes, self.totals.signals
        );
        self.attachment.detach()
    }
}

impl AudioDriver for AudioDevice {
    fn detect_devices() -> Vec<AudioDeviceInfo> {
        detect_devices()
    }

    fn spec(&self) -> &AudioSpec {
        AudioDevice::spec(self)
    }

    fn get_buffer(&mut self) -> &mut [u8] {
        self.buffer_mut()
    }

    fn play(&mut self) -> Result<TransferStats> {
        AudioDevice::play(self)
    }

    fn close(self) -> Detach {
        AudioDevice::close(self)
    }
}
