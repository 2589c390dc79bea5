//! Persist-then-notify dispatch for analyzer-produced alerts.

use std::sync::Arc;

use tracing::{info, warn};

use super::{Alert, Importance};
use crate::notify::Notifier;
use crate::store::Database;

pub struct AlertDispatcher {
    database: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    /// Importance at or above which the operator is mailed
    floor: Importance,
    operator: String,
}

impl AlertDispatcher {
    pub fn new(
        database: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        floor: Importance,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            database,
            notifier,
            floor,
            operator: operator.into(),
        }
    }

    /// Persist `alerts`, then mail each one at or above the floor.
    ///
    /// Persistence failure propagates; notification failure is logged and
    /// never rolls back the already-persisted alerts.
    pub fn dispatch(&self, alerts: &[Alert]) -> Result<(), rusqlite::Error> {
        if alerts.is_empty() {
            return Ok(());
        }
        self.database.insert_alerts(alerts)?;

        for alert in alerts {
            info!(
                alert_id = %alert.id,
                vm_id = %alert.vm_id,
                importance = %alert.importance,
                kind = alert.kind.as_str(),
                "alert persisted"
            );
            if alert.importance < self.floor {
                continue;
            }
            let subject = format!("[vigil] {} alert on {}", alert.importance, alert.vm_id);
            let body = format!(
                "VM: {}\nImportance: {}\n\n{}",
                alert.vm_id, alert.importance, alert.message
            );
            if let Err(e) = self.notifier.send(&self.operator, &subject, &body) {
                warn!(alert_id = %alert.id, error = %e, "alert notification failed");
            }
        }
        Ok(())
    }
}
