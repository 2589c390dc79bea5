//! Alert model: importance tiers and the derived alert record.

mod dispatch;

pub use dispatch::AlertDispatcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Thresholds;

/// Importance ranking. `None` is a first-class "do not persist" outcome, not
/// an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    None,
    Low,
    Medium,
    Critical,
}

impl Importance {
    /// Classify a 0-100 usage percentage against configured cut points.
    pub fn from_usage(pct: f64, thresholds: &Thresholds) -> Self {
        if pct >= thresholds.critical {
            Importance::Critical
        } else if pct >= thresholds.medium {
            Importance::Medium
        } else if pct >= thresholds.low {
            Importance::Low
        } else {
            Importance::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::None => "none",
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Usage,
    Intrusion,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Usage => "usage",
            AlertKind::Intrusion => "intrusion",
        }
    }
}

/// Derived artifact produced exclusively by analyzers. Immutable once
/// persisted; `created_at` carries the originating audit's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub vm_id: String,
    pub agent_id: Option<String>,
    pub importance: Importance,
    pub kind: AlertKind,
    /// Offending username, set on intrusion alerts only
    pub user: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn usage(
        vm_id: &str,
        agent_id: Option<&str>,
        importance: Importance,
        message: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vm_id: vm_id.to_string(),
            agent_id: agent_id.map(str::to_string),
            importance,
            kind: AlertKind::Usage,
            user: None,
            message,
            created_at,
        }
    }

    /// Any disallowed login is critical by definition.
    pub fn intrusion(
        vm_id: &str,
        agent_id: Option<&str>,
        username: &str,
        message: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vm_id: vm_id.to_string(),
            agent_id: agent_id.map(str::to_string),
            importance: Importance::Critical,
            kind: AlertKind::Intrusion,
            user: Some(username.to_string()),
            message,
            created_at,
        }
    }
}
