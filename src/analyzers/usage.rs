//! Percentage-of-capacity analyzers. Each computes a 0-100 usage figure from
//! its category's fields and classifies it against configured cut points;
//! sequence-shaped categories apply the same logic per item.

use super::{Analyzer, AnalyzerInput};
use crate::alert::{Alert, Importance};
use crate::config::Thresholds;
use crate::error::AnalyzerError;
use crate::telemetry::{
    category, parse_payload, ContainerSample, CpuLoadSample, DiskStoreSample, FilesystemSample,
    MemorySample, NetworkSample,
};

fn usage_alert(
    input: &AnalyzerInput<'_>,
    thresholds: &Thresholds,
    pct: f64,
    message: String,
) -> Option<Alert> {
    let importance = Importance::from_usage(pct, thresholds);
    if importance == Importance::None {
        return None;
    }
    Some(Alert::usage(
        input.vm_id,
        Some(&input.agent.id),
        importance,
        message,
        input.observed_at,
    ))
}

pub struct CpuLoadAnalyzer {
    thresholds: Thresholds,
}

impl CpuLoadAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for CpuLoadAnalyzer {
    fn name(&self) -> &'static str {
        "cpu_load"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let sample: CpuLoadSample = parse_payload(category::CPU_LOAD, input.payload)?;
        let pct = sample.usage_pct();
        let message = format!(
            "cpu load at {:.1}% (load {:.2} over {} cores)",
            pct, sample.load_average, sample.logical_cores
        );
        Ok(usage_alert(input, &self.thresholds, pct, message)
            .into_iter()
            .collect())
    }
}

pub struct MemoryAnalyzer {
    thresholds: Thresholds,
}

impl MemoryAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for MemoryAnalyzer {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let sample: MemorySample = parse_payload(category::MEMORY, input.payload)?;
        let pct = sample.usage_pct();
        let message = format!(
            "memory usage at {:.1}% ({} of {} bytes available)",
            pct, sample.available, sample.total
        );
        Ok(usage_alert(input, &self.thresholds, pct, message)
            .into_iter()
            .collect())
    }
}

pub struct DiskStoresAnalyzer {
    thresholds: Thresholds,
}

impl DiskStoresAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for DiskStoresAnalyzer {
    fn name(&self) -> &'static str {
        "disk_stores"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let stores: Vec<DiskStoreSample> = parse_payload(category::DISK_STORES, input.payload)?;
        Ok(stores
            .iter()
            .filter_map(|store| {
                let pct = store.usage_pct();
                let message = format!("disk store '{}' at {:.1}% capacity", store.name, pct);
                usage_alert(input, &self.thresholds, pct, message)
            })
            .collect())
    }
}

pub struct FilesystemsAnalyzer {
    thresholds: Thresholds,
}

impl FilesystemsAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for FilesystemsAnalyzer {
    fn name(&self) -> &'static str {
        "filesystems"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let filesystems: Vec<FilesystemSample> =
            parse_payload(category::FILESYSTEMS, input.payload)?;
        Ok(filesystems
            .iter()
            .filter_map(|fs| {
                let pct = fs.usage_pct();
                let message = format!("filesystem '{}' at {:.1}% capacity", fs.mount, pct);
                usage_alert(input, &self.thresholds, pct, message)
            })
            .collect())
    }
}

pub struct NetworkAnalyzer {
    thresholds: Thresholds,
}

impl NetworkAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for NetworkAnalyzer {
    fn name(&self) -> &'static str {
        "network"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let interfaces: Vec<NetworkSample> = parse_payload(category::NETWORK, input.payload)?;
        Ok(interfaces
            .iter()
            .filter_map(|iface| {
                let pct = iface.usage_pct();
                let message =
                    format!("interface '{}' at {:.1}% of link capacity", iface.name, pct);
                usage_alert(input, &self.thresholds, pct, message)
            })
            .collect())
    }
}

pub struct DockerCpuAnalyzer {
    thresholds: Thresholds,
}

impl DockerCpuAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for DockerCpuAnalyzer {
    fn name(&self) -> &'static str {
        "docker_cpu"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let containers: Vec<ContainerSample> =
            parse_payload(category::DOCKER_STATS, input.payload)?;
        Ok(containers
            .iter()
            .filter_map(|c| {
                let pct = c.cpu_pct();
                let message = format!("container '{}' cpu at {:.1}%", c.name, pct);
                usage_alert(input, &self.thresholds, pct, message)
            })
            .collect())
    }
}

pub struct DockerMemoryAnalyzer {
    thresholds: Thresholds,
}

impl DockerMemoryAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Analyzer for DockerMemoryAnalyzer {
    fn name(&self) -> &'static str {
        "docker_memory"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let containers: Vec<ContainerSample> =
            parse_payload(category::DOCKER_STATS, input.payload)?;
        Ok(containers
            .iter()
            .filter_map(|c| {
                let pct = c.memory_pct();
                let message = format!("container '{}' memory at {:.1}%", c.name, pct);
                usage_alert(input, &self.thresholds, pct, message)
            })
            .collect())
    }
}
