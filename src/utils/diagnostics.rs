//! Startup Diagnostics
//!
//! Host and connection facts logged by the probe binary before it attaches.

use sysinfo::System;
use tracing::info;

use crate::config::Config;
use crate::driver::BOOTSTRAP;

/// System information for diagnostics
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name
    pub os_name: String,
    /// Operating system version string
    pub os_version: String,
    /// Kernel version string
    pub kernel_version: String,
    /// Number of logical CPU cores
    pub cpu_count: usize,
    /// Total system memory in megabytes
    pub total_memory_mb: u64,
}

impl SystemInfo {
    /// Gather system information
    pub fn gather() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            cpu_count: sys.cpus().len(),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
        }
    }

    /// Log system information
    pub fn log(&self) {
        info!("=== System Information ===");
        info!("  OS: {} {}", self.os_name, self.os_version);
        info!("  Kernel: {}", self.kernel_version);
        info!("  CPUs: {}", self.cpu_count);
        info!("  Memory: {} MB", self.total_memory_mb);
    }
}

/// Connection environment as seen by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEnvironment {
    /// Variable consulted
    pub env_var: String,
    /// Its value, if set
    pub value: Option<String>,
}

impl ConnectionEnvironment {
    /// Read the configured connection variable
    pub fn detect(config: &Config) -> Self {
        let env_var = config.connection.env_var.clone();
        let value = std::env::var(&env_var).ok();
        Self { env_var, value }
    }

    /// Driver can attach
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

/// Log complete diagnostics on startup
pub fn log_startup_diagnostics(config: &Config) {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║          Startup Diagnostics                              ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    SystemInfo::gather().log();

    info!("=== Connection ===");
    info!("  Driver: {} ({})", BOOTSTRAP.name, BOOTSTRAP.description);
    let environment = ConnectionEnvironment::detect(config);
    match &environment.value {
        Some(value) => info!("  {}: {}", environment.env_var, value),
        None => info!("  {}: not set", environment.env_var),
    }
    info!("  Primary segment kind: {}", config.primary_kind());

    info!("=== Build ===");
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "  Commit: {} ({})",
        env!("SHMIF_BRIDGE_COMMIT"),
        env!("SHMIF_BRIDGE_BUILD_DATE")
    );
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");
}
