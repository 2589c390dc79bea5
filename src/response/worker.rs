//! Dedicated response worker thread. Ingestion hands requests over an
//! `mpsc` channel and moves on; a slow or dead agent can never apply
//! backpressure to unrelated audit processing.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info, warn};

use super::IntrusionResponder;
use crate::store::Database;

/// One disallowed login to act on.
#[derive(Debug, Clone)]
pub struct ResponseRequest {
    pub agent_id: String,
    pub vm_id: String,
    pub username: String,
}

/// Start the worker on its own thread. The loop exits when every sender is
/// dropped.
pub fn spawn(
    responder: IntrusionResponder,
    database: Arc<Database>,
) -> std::io::Result<(Sender<ResponseRequest>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel();
    let handle = std::thread::Builder::new()
        .name("intrusion-response".to_string())
        .spawn(move || run_loop(responder, database, rx))?;
    Ok((tx, handle))
}

fn run_loop(responder: IntrusionResponder, database: Arc<Database>, rx: Receiver<ResponseRequest>) {
    info!("intrusion response worker started");
    while let Ok(req) = rx.recv() {
        match database.find_agent(&req.agent_id) {
            Ok(Some(agent)) => {
                let outcome = responder.respond(&agent, &req.vm_id, &req.username);
                info!(
                    agent_id = %req.agent_id,
                    username = %req.username,
                    outcome = ?outcome,
                    "intrusion response finished"
                );
            }
            Ok(None) => warn!(agent_id = %req.agent_id, "agent vanished before response"),
            Err(e) => error!(agent_id = %req.agent_id, error = %e, "agent lookup failed"),
        }
    }
    info!("intrusion response worker stopped");
}
