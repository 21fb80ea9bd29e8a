//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Environment variable that must be set for the driver to be available
    pub env_var: String,

    /// Segment kind requested for the primary ("game", "application")
    pub segment_kind: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            env_var: "ARCAN_CONNPATH".to_string(),
            segment_kind: "game".to_string(),
        }
    }
}

/// Video configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Sleep between window negotiation passes in milliseconds
    #[serde(default = "default_request_poll_interval_ms")]
    pub request_poll_interval_ms: u64,

    /// Maximum events drained per segment in one pump cycle
    #[serde(default = "default_pump_event_budget")]
    pub pump_event_budget: usize,

    /// Keymap ("auto", "linux", "raw")
    #[serde(default = "default_keymap")]
    pub keymap: String,
}

fn default_request_poll_interval_ms() -> u64 {
    1
}

fn default_pump_event_budget() -> usize {
    512
}

fn default_keymap() -> String {
    "auto".to_string()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            request_poll_interval_ms: default_request_poll_interval_ms(),
            pump_event_budget: default_pump_event_budget(),
            keymap: default_keymap(),
        }
    }
}

/// Audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample frames per period
    pub samples: u16,

    /// Total audio buffer budget in bytes, split into period-sized buffers
    pub ring_budget: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            samples: 1024,
            ring_budget: 65536,
        }
    }
}

/// GL context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlConfig {
    /// Requested context major version
    pub major: u8,

    /// Requested context minor version
    pub minor: u8,

    /// Depth buffer bits
    pub depth_bits: u8,

    /// Stencil buffer bits
    pub stencil_bits: u8,

    /// Refuse contexts beyond the built-in one per segment
    #[serde(default)]
    pub builtin_only: bool,

    /// Path of the GL library to load, platform default when unset
    #[serde(default)]
    pub library: Option<PathBuf>,
}

impl Default for GlConfig {
    fn default() -> Self {
        Self {
            major: 2,
            minor: 1,
            depth_bits: 24,
            stencil_bits: 8,
            builtin_only: false,
            library: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily rotated log files
    pub log_dir: Option<PathBuf>,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
