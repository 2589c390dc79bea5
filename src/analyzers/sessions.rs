//! Membership analyzer over interactive logins. A username outside the
//! agent's allow-list is an intrusion: unconditionally CRITICAL, no
//! percentage, no below-threshold case.

use super::{Analyzer, AnalyzerInput};
use crate::alert::Alert;
use crate::error::AnalyzerError;
use crate::telemetry::{category, parse_payload, SessionSample};

#[derive(Default)]
pub struct SessionsAnalyzer;

impl SessionsAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for SessionsAnalyzer {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn analyze(&self, input: &AnalyzerInput<'_>) -> Result<Vec<Alert>, AnalyzerError> {
        let sessions: Vec<SessionSample> = parse_payload(category::USER_SESSIONS, input.payload)?;
        Ok(sessions
            .iter()
            .filter(|s| !input.agent.allowed_users.iter().any(|u| u == &s.username))
            .map(|s| {
                let message = match &s.host {
                    Some(host) => {
                        format!("disallowed login by '{}' from {}", s.username, host)
                    }
                    None => format!("disallowed login by '{}'", s.username),
                };
                Alert::intrusion(
                    input.vm_id,
                    Some(&input.agent.id),
                    &s.username,
                    message,
                    input.observed_at,
                )
            })
            .collect())
    }
}
