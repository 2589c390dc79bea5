//! The ingestion pipeline. Strictly linear per push:
//! resolve agent → resolve channel key → decrypt → re-encrypt at rest →
//! persist → signal. Any failing step aborts the push with one typed outcome
//! and no partial state; retries are the transport's concern, not ours.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::IngestRequest;
use crate::analyzers::AnalyzerEngine;
use crate::crypto::{at_rest, channel};
use crate::error::PipelineError;
use crate::keystore::{SecretStore, AT_REST_ALIAS};
use crate::store::{Audit, Database};

pub struct IngestService {
    database: Arc<Database>,
    keystore: Arc<SecretStore>,
    /// Unlocks the at-rest key; the per-agent channel keys unlock with each
    /// agent's own credential.
    master_password: String,
    engine: Arc<AnalyzerEngine>,
}

impl IngestService {
    pub fn new(
        database: Arc<Database>,
        keystore: Arc<SecretStore>,
        master_password: impl Into<String>,
        engine: Arc<AnalyzerEngine>,
    ) -> Self {
        Self {
            database,
            keystore,
            master_password: master_password.into(),
            engine,
        }
    }

    /// Run one push through the pipeline. On success the audit is durably
    /// persisted and the created-signal has been consumed; the returned
    /// record still carries ciphertext.
    pub fn ingest(&self, request: &IngestRequest) -> Result<Audit, PipelineError> {
        let agent = self
            .database
            .find_agent(&request.agent_id)?
            .ok_or_else(|| PipelineError::UnknownAgent(request.agent_id.clone()))?;
        if !agent.active {
            return Err(PipelineError::InactiveAgent(agent.id));
        }

        let channel_key = self
            .keystore
            .get(&agent.id, &agent.credential)?
            .ok_or_else(|| PipelineError::KeyUnavailable(agent.id.clone()))?;

        // The security checkpoint: a spoofed agent id, tampered or truncated
        // envelope, or wrong key all die here.
        let plaintext = channel::decrypt(&request.ciphertext, agent.id.as_bytes(), &channel_key)
            .map_err(|_| PipelineError::Authentication(agent.id.clone()))?;

        let at_rest_key = self
            .keystore
            .get(AT_REST_ALIAS, &self.master_password)?
            .ok_or_else(|| PipelineError::KeyUnavailable(AT_REST_ALIAS.to_string()))?;
        let data = at_rest::encrypt(&plaintext, &at_rest_key)
            .map_err(|_| PipelineError::Encryption)?;
        drop(plaintext);

        let audit = Audit::new(
            Some(agent.id.clone()),
            &request.vm_id,
            &request.category,
            request.observed_at,
            data,
        );
        self.database.insert_audit(&audit)?;
        self.database.touch_agent(&agent.id, Utc::now())?;
        info!(
            audit_id = %audit.id,
            agent_id = %agent.id,
            category = %audit.category,
            "audit persisted"
        );

        // At-most-once created-signal, only after the durable persist above.
        // An analysis failure is the engine's problem; it never un-persists
        // the audit.
        if let Err(e) = self.engine.on_audit_created(&audit) {
            warn!(audit_id = %audit.id, error = %e, "analysis failed");
        }

        Ok(audit)
    }
}
