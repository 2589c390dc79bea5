//! Telemetry categories and their payload shapes.
//!
//! A payload arrives (and is stored) as ciphertext; once decrypted it must
//! parse as the struct matching its category tag, or the pipeline fails
//! closed for that item.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// Category tags pushed by agents. Free-form strings on the wire; these are
/// the tags the server registers analyzers for.
pub mod category {
    pub const CPU_LOAD: &str = "cpu_load";
    pub const MEMORY: &str = "memory";
    pub const DISK_STORES: &str = "disk_stores";
    pub const FILESYSTEMS: &str = "filesystems";
    pub const NETWORK: &str = "network";
    pub const DOCKER_STATS: &str = "docker_stats";
    pub const USER_SESSIONS: &str = "user_sessions";
}

/// One-shot system load sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuLoadSample {
    pub load_average: f64,
    pub logical_cores: u32,
}

impl CpuLoadSample {
    pub fn usage_pct(&self) -> f64 {
        if self.logical_cores == 0 {
            return 0.0;
        }
        self.load_average / self.logical_cores as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySample {
    pub total: u64,
    pub available: u64,
}

impl MemorySample {
    pub fn usage_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total.saturating_sub(self.available)) as f64 / self.total as f64 * 100.0
    }
}

/// One physical disk store; the payload is a sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStoreSample {
    pub name: String,
    pub total: u64,
    pub free: u64,
}

impl DiskStoreSample {
    pub fn usage_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total.saturating_sub(self.free)) as f64 / self.total as f64 * 100.0
    }
}

/// One mounted filesystem; the payload is a sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemSample {
    pub mount: String,
    pub total_space: u64,
    pub usable_space: u64,
}

impl FilesystemSample {
    pub fn usage_pct(&self) -> f64 {
        if self.total_space == 0 {
            return 0.0;
        }
        (self.total_space.saturating_sub(self.usable_space)) as f64 / self.total_space as f64
            * 100.0
    }
}

/// One network interface; the payload is a sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSample {
    pub name: String,
    /// Link capacity, bytes per second
    pub capacity: u64,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
}

impl NetworkSample {
    pub fn usage_pct(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.rx_bytes_per_sec + self.tx_bytes_per_sec) as f64 / self.capacity as f64 * 100.0
    }
}

/// One running container with current and previous cgroup CPU samples; the
/// payload is a sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSample {
    pub container_id: String,
    pub name: String,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub cpu_total_usage: u64,
    pub precpu_total_usage: u64,
    pub system_cpu_usage: u64,
    pub presystem_cpu_usage: u64,
    pub online_cpus: u32,
}

impl ContainerSample {
    pub fn memory_pct(&self) -> f64 {
        if self.memory_limit == 0 {
            return 0.0;
        }
        self.memory_usage as f64 / self.memory_limit as f64 * 100.0
    }

    /// Standard two-sample delta ratio:
    /// `(cpu_delta / system_delta) × online_cpus × 100`.
    pub fn cpu_pct(&self) -> f64 {
        let cpu_delta = self.cpu_total_usage.saturating_sub(self.precpu_total_usage);
        let system_delta = self
            .system_cpu_usage
            .saturating_sub(self.presystem_cpu_usage);
        if system_delta == 0 {
            return 0.0;
        }
        cpu_delta as f64 / system_delta as f64 * self.online_cpus as f64 * 100.0
    }
}

/// One interactive login; the payload is a sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSample {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_time: Option<i64>,
}

/// Parse a decrypted payload for its category, failing closed on mismatch.
pub fn parse_payload<T: DeserializeOwned>(category: &str, payload: &str) -> Result<T, AnalyzerError> {
    serde_json::from_str(payload).map_err(|e| AnalyzerError::MalformedPayload {
        category: category.to_string(),
        reason: e.to_string(),
    })
}
