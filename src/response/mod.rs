//! Automated intrusion response: push an authenticated command back to the
//! agent that produced the offending audit, and report the outcome.

mod responder;
mod worker;

pub use responder::IntrusionResponder;
pub use worker::{spawn, ResponseRequest};

use serde::{Deserialize, Serialize};

/// Terminal outcome of one response run. Each maps 1:1 to its own operator
/// notification; the mapping is never collapsed, so "agent is down" stays
/// distinguishable from "agent is up but could not act".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Liveness check failed; no command was attempted.
    Unreachable,
    /// Agent accepted the command (HTTP 200).
    Succeeded,
    /// Agent was alive but the command was not accepted.
    FailedRemote,
}

/// Command payload sent to the agent, encrypted with its channel key and
/// bound to its identity (same binding as ingestion, so a command for one
/// agent cannot be replayed at another).
#[derive(Debug, Serialize, Deserialize)]
pub struct IntrusionCommand<'a> {
    pub command: &'a str,
    /// The offending username
    pub arguments: &'a str,
}
