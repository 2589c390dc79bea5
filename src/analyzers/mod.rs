//! Category-specific audit analyzers.
//!
//! A fixed registry maps category tags to an ordered list of analyzers,
//! built once at startup from configuration. Each analyzer is a pure
//! function over one decrypted payload: it alone decides whether to emit
//! alerts (a below-threshold reading or an allow-listed login produces
//! nothing — callers never filter).

mod engine;
mod sessions;
mod usage;

pub use engine::AnalyzerEngine;
pub use sessions::SessionsAnalyzer;
pub use usage::{
    CpuLoadAnalyzer, DiskStoresAnalyzer, DockerCpuAnalyzer, DockerMemoryAnalyzer,
    FilesystemsAnalyzer, MemoryAnalyzer, NetworkAnalyzer,
};

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::alert::Alert;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::store::Agent;
use crate::telemetry::category;

/// Decrypted view of one audit, handed to every analyzer registered for its
/// category.
pub struct AnalyzerInput<'a> {
    /// Decrypted payload JSON
    pub payload: &'a str,
    /// Originating agent
    pub agent: &'a Agent,
    pub vm_id: &'a str,
    /// The audit's original timestamp, carried onto every alert
    pub observed_at: DateTime<Utc>,
}

pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError>;
}

/// Explicit category → analyzers table. Per-category order is insertion
/// order and never changes after startup, so alert ordering is reproducible.
#[derive(Default)]
pub struct AnalyzerRegistry {
    entries: HashMap<String, Vec<Box<dyn Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, category: &str, analyzer: Box<dyn Analyzer>) {
        self.entries
            .entry(category.to_string())
            .or_default()
            .push(analyzer);
    }

    /// Analyzers for `category`; empty for unregistered categories (many are
    /// informational only).
    pub fn for_category(&self, category: &str) -> &[Box<dyn Analyzer>] {
        self.entries.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> usize {
        self.entries.len()
    }

    /// The standard deployment table, built once at startup.
    pub fn standard(config: &AnalyzerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            category::CPU_LOAD,
            Box::new(CpuLoadAnalyzer::new(config.cpu_load)),
        );
        registry.register(
            category::MEMORY,
            Box::new(MemoryAnalyzer::new(config.memory)),
        );
        registry.register(
            category::DISK_STORES,
            Box::new(DiskStoresAnalyzer::new(config.disk_stores)),
        );
        registry.register(
            category::FILESYSTEMS,
            Box::new(FilesystemsAnalyzer::new(config.filesystems)),
        );
        registry.register(
            category::NETWORK,
            Box::new(NetworkAnalyzer::new(config.network)),
        );
        registry.register(
            category::DOCKER_STATS,
            Box::new(DockerCpuAnalyzer::new(config.docker_cpu)),
        );
        registry.register(
            category::DOCKER_STATS,
            Box::new(DockerMemoryAnalyzer::new(config.docker_memory)),
        );
        registry.register(category::USER_SESSIONS, Box::new(SessionsAnalyzer::new()));
        registry
    }
}
