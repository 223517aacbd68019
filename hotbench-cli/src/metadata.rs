//! Run Metadata
//!
//! Host details recorded next to JSON results. CPU model lookup only works on
//! Linux and reports "Unknown" elsewhere.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where and when a run happened
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// hotbench version
    pub version: String,
    /// UTC time the results were written
    pub timestamp: DateTime<Utc>,
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// CPU model name
    pub cpu: String,
    /// Available cores
    pub cpu_cores: u32,
}

impl RunMetadata {
    /// Metadata for the current host, timestamped now
    pub fn collect() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu: cpu_model().unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: num_cpus(),
        }
    }
}

/// CPU model name from /proc/cpuinfo (Linux only)
fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
