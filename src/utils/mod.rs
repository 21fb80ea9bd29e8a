//! Utility Functions and Diagnostics
//!
//! Startup diagnostics and user-friendly error formatting for the probe
//! binary.
//!
//! ```rust,no_run
//! use shmif_bridge::config::Config;
//! use shmif_bridge::utils::{format_user_error, log_startup_diagnostics};
//!
//! let config = Config::default_config();
//! log_startup_diagnostics(&config);
//!
//! let error = anyhow::anyhow!("Failed to parse config file");
//! eprintln!("{}", format_user_error(&error));
//! ```

pub mod diagnostics;
pub mod errors;

pub use diagnostics::{log_startup_diagnostics, ConnectionEnvironment, SystemInfo};
pub use errors::{error_kind, format_user_error};
