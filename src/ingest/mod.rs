//! Encrypted audit ingestion: the one path telemetry takes from an agent's
//! push to a persisted, analyzed audit.

mod pipeline;

pub use pipeline::IngestService;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound telemetry push, already validated for shape by the transport
/// layer. `ciphertext` is a channel-scheme envelope produced by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub agent_id: String,
    pub ciphertext: String,
    pub category: String,
    pub vm_id: String,
    pub observed_at: DateTime<Utc>,
}
