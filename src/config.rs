//! Server configuration. Built once at startup, passed by reference, never
//! mutated after construction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::alert::Importance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Data directory (database, keystore)
    pub data_dir: PathBuf,
    /// Secret store location and unlock password
    pub keystore: KeystoreConfig,
    /// Per-category analyzer thresholds
    pub analyzers: AnalyzerConfig,
    /// Alert persistence and notification floor
    pub alerts: AlertConfig,
    /// Operator mail transport
    pub mail: MailConfig,
    /// Intrusion response HTTP timeouts
    pub response: ResponseConfig,
    /// Audit retention and daemon cycle
    pub retention: RetentionConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Keystore file name, relative to `data_dir`
    pub file: PathBuf,
    /// Password protecting the at-rest and JWT signing keys
    pub master_password: String,
}

/// Three-tier cut points over a 0-100 usage percentage. Values are
/// deployment parameters; the tier shape is fixed everywhere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Below this: no alert
    pub low: f64,
    pub medium: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub cpu_load: Thresholds,
    pub memory: Thresholds,
    pub disk_stores: Thresholds,
    pub filesystems: Thresholds,
    pub network: Thresholds,
    pub docker_cpu: Thresholds,
    pub docker_memory: Thresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Importance at or above which an alert is mailed to the operator
    pub notify_floor: Importance,
    pub operator_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Audits older than this are pruned by the daemon loop
    pub audit_days: i64,
    /// Daemon cycle interval (seconds); 0 runs a single cycle and exits
    pub cycle_secs: u64,
    /// Max inbox entries drained per cycle
    pub inbox_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vigil"),
            keystore: KeystoreConfig::default(),
            analyzers: AnalyzerConfig::default(),
            alerts: AlertConfig::default(),
            mail: MailConfig::default(),
            response: ResponseConfig::default(),
            retention: RetentionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("keystore.db"),
            master_password: "change-me".to_string(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 60.0,
            medium: 80.0,
            critical: 90.0,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cpu_load: Thresholds::default(),
            memory: Thresholds::default(),
            disk_stores: Thresholds::default(),
            filesystems: Thresholds::default(),
            network: Thresholds::default(),
            docker_cpu: Thresholds::default(),
            docker_memory: Thresholds::default(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            notify_floor: Importance::Medium,
            operator_email: "ops@localhost".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_addr: "vigil@localhost".to_string(),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            audit_days: 30,
            cycle_secs: 5,
            inbox_batch: 64,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ServerConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<ServerConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
