pub mod alerts;
pub mod client;
pub mod codec;
pub mod config;
pub mod host;
pub mod logging;
pub mod notifier;
pub mod sampler;
pub mod server;
pub mod telegram;
pub mod util;

#[cfg(feature = "dashboard")]
pub mod dashboard;

use serde::{Deserialize, Serialize};

/// One snapshot of host resource usage, published once per sampling tick.
///
/// Field names are the wire names consumers rely on. New fields must be additive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,
    #[serde(rename = "memory")]
    pub memory_percent: f64,
    #[serde(default)]
    pub memory_total_gb: f64,
    #[serde(default)]
    pub memory_used_gb: f64,
    #[serde(rename = "disk")]
    pub disk_percent: f64,
    #[serde(default)]
    pub disk_total_gb: f64,
    #[serde(default)]
    pub disk_used_gb: f64,
    #[serde(default)]
    pub top_cpu_processes: Vec<CpuProcess>,
    #[serde(default)]
    pub top_memory_processes: Vec<MemoryProcess>,
    /// Unix seconds
    #[serde(default)]
    pub timestamp: f64,
}

/// A process ranked by its interval CPU usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuProcess {
    pub pid: u32,
    pub name: String,
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,
}

/// A process ranked by its resident memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryProcess {
    pub pid: u32,
    pub name: String,
    pub memory_mb: f64,
}
