//! Persistent store: audits, alerts, the agent directory, and the inbound
//! push spool. One SQLite database; each call is its own transaction.

mod database;

pub use database::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered agent as seen by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    /// Password-derived credential unlocking the agent's channel key
    pub credential: String,
    /// Base URL for liveness checks and command dispatch
    pub callback_addr: String,
    /// Usernames allowed to log in on this agent's host
    pub allowed_users: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        credential: impl Into<String>,
        callback_addr: impl Into<String>,
        allowed_users: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            credential: credential.into(),
            callback_addr: callback_addr.into(),
            allowed_users,
            active: true,
            created_at: Utc::now(),
            last_seen: None,
        }
    }
}

/// One ingested telemetry record. `data` is always ciphertext at rest; the
/// record is written once by the pipeline and never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: String,
    pub agent_id: Option<String>,
    pub vm_id: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    /// Base64 at-rest envelope
    pub data: String,
}

impl Audit {
    pub fn new(
        agent_id: Option<String>,
        vm_id: impl Into<String>,
        category: impl Into<String>,
        created_at: DateTime<Utc>,
        data: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id,
            vm_id: vm_id.into(),
            category: category.into(),
            created_at,
            data,
        }
    }
}
