//! Analysis pass over a freshly persisted audit: decrypt a transient copy,
//! run the registered analyzers in stable order, dispatch the collected
//! alerts, and trigger intrusion response for critical intrusion alerts.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{AnalyzerInput, AnalyzerRegistry};
use crate::alert::{Alert, AlertDispatcher, AlertKind, Importance};
use crate::crypto::at_rest;
use crate::error::{CryptoError, EngineError};
use crate::keystore::{SecretStore, AT_REST_ALIAS};
use crate::response::ResponseRequest;
use crate::store::{Audit, Database};

pub struct AnalyzerEngine {
    registry: AnalyzerRegistry,
    database: Arc<Database>,
    keystore: Arc<SecretStore>,
    master_password: String,
    dispatcher: AlertDispatcher,
    /// Absent in deployments without the response worker (and in tests that
    /// only exercise analysis).
    response_tx: Option<Sender<ResponseRequest>>,
}

impl AnalyzerEngine {
    pub fn new(
        registry: AnalyzerRegistry,
        database: Arc<Database>,
        keystore: Arc<SecretStore>,
        master_password: impl Into<String>,
        dispatcher: AlertDispatcher,
        response_tx: Option<Sender<ResponseRequest>>,
    ) -> Self {
        Self {
            registry,
            database,
            keystore,
            master_password: master_password.into(),
            dispatcher,
            response_tx,
        }
    }

    /// Consume the created-signal for one persisted audit.
    ///
    /// Failure here never touches the stored record: the decrypt works on a
    /// transient copy that is dropped before dispatch, and an analyzer that
    /// rejects its payload is skipped without aborting the others.
    pub fn on_audit_created(&self, audit: &Audit) -> Result<Vec<Alert>, EngineError> {
        let analyzers = self.registry.for_category(&audit.category);
        if analyzers.is_empty() {
            // Informational category, nothing registered.
            return Ok(Vec::new());
        }

        let Some(agent_id) = audit.agent_id.as_deref() else {
            debug!(audit_id = %audit.id, "audit has no agent, analysis skipped");
            return Ok(Vec::new());
        };
        let Some(agent) = self.database.find_agent(agent_id)? else {
            warn!(audit_id = %audit.id, agent_id, "agent vanished, analysis skipped");
            return Ok(Vec::new());
        };

        let key = self
            .keystore
            .get(AT_REST_ALIAS, &self.master_password)?
            .ok_or(EngineError::KeyUnavailable)?;
        let plaintext = at_rest::decrypt(&audit.data, &key)?;
        let payload = String::from_utf8(plaintext)
            .map_err(|_| EngineError::Decrypt(CryptoError::Malformed("payload is not utf-8")))?;

        let input = AnalyzerInput {
            payload: &payload,
            agent: &agent,
            vm_id: &audit.vm_id,
            observed_at: audit.created_at,
        };
        let mut alerts = Vec::new();
        for analyzer in analyzers {
            match analyzer.analyze(&input) {
                Ok(mut produced) => alerts.append(&mut produced),
                Err(e) => warn!(
                    analyzer = analyzer.name(),
                    audit_id = %audit.id,
                    error = %e,
                    "analyzer skipped"
                ),
            }
        }
        // The decrypted copy dies here; the stored ciphertext was never touched.
        drop(input);
        drop(payload);

        self.dispatcher.dispatch(&alerts)?;
        self.trigger_response(&agent.id, &audit.vm_id, &alerts);

        if !alerts.is_empty() {
            info!(
                audit_id = %audit.id,
                category = %audit.category,
                count = alerts.len(),
                "analysis produced alerts"
            );
        }
        Ok(alerts)
    }

    fn trigger_response(&self, agent_id: &str, vm_id: &str, alerts: &[Alert]) {
        let Some(tx) = &self.response_tx else {
            return;
        };
        for alert in alerts {
            if alert.kind != AlertKind::Intrusion || alert.importance != Importance::Critical {
                continue;
            }
            let Some(username) = &alert.user else {
                continue;
            };
            let req = ResponseRequest {
                agent_id: agent_id.to_string(),
                vm_id: vm_id.to_string(),
                username: username.clone(),
            };
            if tx.send(req).is_err() {
                warn!(agent_id, "response worker unavailable, intrusion not acted on");
            }
        }
    }
}
