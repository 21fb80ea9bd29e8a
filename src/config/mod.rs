//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod types;

pub use types::{AudioConfig, ConnectionConfig, GlConfig, LoggingConfig, VideoConfig};

use crate::events::KeymapKind;
use crate::protocol::SegmentKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Video configuration
    #[serde(default)]
    pub video: VideoConfig,
    /// Audio configuration
    #[serde(default)]
    pub audio: AudioConfig,
    /// GL context configuration
    #[serde(default)]
    pub gl: GlConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.env_var.is_empty() {
            anyhow::bail!("connection.env_var must not be empty");
        }

        match self.connection.segment_kind.as_str() {
            "game" | "application" => {}
            _ => anyhow::bail!(
                "Invalid primary segment kind: {}",
                self.connection.segment_kind
            ),
        }

        if KeymapKind::from_name(&self.video.keymap).is_none() {
            anyhow::bail!("Invalid keymap: {}", self.video.keymap);
        }

        if self.video.pump_event_budget == 0 {
            anyhow::bail!("video.pump_event_budget must be at least 1");
        }

        if self.audio.samples == 0 {
            anyhow::bail!("audio.samples must be at least 1");
        }

        let period = self.audio_period_bytes();
        if self.audio.ring_budget < period {
            anyhow::bail!(
                "audio.ring_budget ({}) is smaller than one period ({} bytes)",
                self.audio.ring_budget,
                period
            );
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, log_level: Option<String>, log_format: Option<String>) -> Self {
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        if let Some(format) = log_format {
            self.logging.format = format;
        }
        self
    }

    /// Primary segment kind
    pub fn primary_kind(&self) -> SegmentKind {
        SegmentKind::from_name(&self.connection.segment_kind).unwrap_or(SegmentKind::Game)
    }

    /// Keymap selection
    pub fn keymap(&self) -> KeymapKind {
        KeymapKind::from_name(&self.video.keymap).unwrap_or_default()
    }

    /// Sleep between window negotiation passes
    pub fn request_poll_interval(&self) -> Duration {
        Duration::from_millis(self.video.request_poll_interval_ms)
    }

    /// Bytes in one audio period
    pub fn audio_period_bytes(&self) -> usize {
        self.audio.samples as usize * crate::protocol::AUDIO_FRAME_BYTES
    }
}
