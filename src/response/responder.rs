//! The three-outcome response state machine: liveness check, encrypted
//! command dispatch, outcome notification.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use super::{IntrusionCommand, ResponseOutcome};
use crate::config::ResponseConfig;
use crate::crypto::channel;
use crate::keystore::SecretStore;
use crate::notify::Notifier;
use crate::store::Agent;

#[derive(Serialize)]
struct CommandRequest<'a> {
    payload: &'a str,
}

pub struct IntrusionResponder {
    client: reqwest::blocking::Client,
    keystore: Arc<SecretStore>,
    notifier: Arc<dyn Notifier>,
    operator: String,
}

impl IntrusionResponder {
    pub fn new(
        config: &ResponseConfig,
        keystore: Arc<SecretStore>,
        notifier: Arc<dyn Notifier>,
        operator: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            keystore,
            notifier,
            operator: operator.into(),
        })
    }

    /// Run the full response sequence against `agent` for one disallowed
    /// login. Every path is terminal; nothing is retried.
    pub fn respond(&self, agent: &Agent, vm_id: &str, username: &str) -> ResponseOutcome {
        if !self.is_alive(agent) {
            warn!(agent_id = %agent.id, "agent not responding, intrusion command not sent");
            self.notify(agent, vm_id, username, ResponseOutcome::Unreachable);
            return ResponseOutcome::Unreachable;
        }

        let outcome = match self.send_command(agent, username) {
            Ok(()) => {
                info!(agent_id = %agent.id, username, "intrusion command accepted");
                ResponseOutcome::Succeeded
            }
            Err(e) => {
                warn!(agent_id = %agent.id, username, error = %e, "intrusion command failed");
                ResponseOutcome::FailedRemote
            }
        };
        self.notify(agent, vm_id, username, outcome);
        outcome
    }

    /// Liveness check on the agent's well-known health path. Anything but a
    /// 200 means unreachable.
    fn is_alive(&self, agent: &Agent) -> bool {
        let url = format!("{}/health", agent.callback_addr.trim_end_matches('/'));
        match self.client.get(&url).send() {
            Ok(res) => res.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    fn send_command(&self, agent: &Agent, username: &str) -> Result<(), String> {
        let key = self
            .keystore
            .get(&agent.id, &agent.credential)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "channel key unavailable".to_string())?;

        let command = IntrusionCommand {
            command: "intrusion",
            arguments: username,
        };
        let plaintext = serde_json::to_vec(&command).map_err(|e| e.to_string())?;
        let payload =
            channel::encrypt(&plaintext, agent.id.as_bytes(), &key).map_err(|e| e.to_string())?;

        let url = format!("{}/command", agent.callback_addr.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .json(&CommandRequest { payload: &payload })
            .send()
            .map_err(|e| e.to_string())?;
        if res.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(format!("agent returned {}", res.status()))
        }
    }

    fn notify(&self, agent: &Agent, vm_id: &str, username: &str, outcome: ResponseOutcome) {
        let (subject, body) = match outcome {
            ResponseOutcome::Unreachable => (
                "[vigil] agent not responding".to_string(),
                format!(
                    "Agent {} (vm {}) did not answer its liveness check.\n\
                     The intrusion command for user '{}' was not sent.",
                    agent.id, vm_id, username
                ),
            ),
            ResponseOutcome::Succeeded => (
                "[vigil] intruder kicked out".to_string(),
                format!(
                    "User '{}' was kicked out on vm {} by agent {}.",
                    username, vm_id, agent.id
                ),
            ),
            ResponseOutcome::FailedRemote => (
                "[vigil] could not kill intruder processes".to_string(),
                format!(
                    "Agent {} (vm {}) is alive but could not kill the processes of user '{}'.",
                    agent.id, vm_id, username
                ),
            ),
        };
        if let Err(e) = self.notifier.send(&self.operator, &subject, &body) {
            warn!(agent_id = %agent.id, error = %e, "response notification failed");
        }
    }
}
