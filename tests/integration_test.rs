//! Integration: keystore semantics, ingestion pipeline, atomicity, retention.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::RngCore;

use vigil_server::alert::{Alert, AlertDispatcher, Importance};
use vigil_server::analyzers::{AnalyzerEngine, AnalyzerRegistry};
use vigil_server::config::{AnalyzerConfig, ServerConfig};
use vigil_server::crypto::{at_rest, channel};
use vigil_server::error::{NotifyError, PipelineError};
use vigil_server::ingest::{IngestRequest, IngestService};
use vigil_server::keystore::{SecretStore, AT_REST_ALIAS};
use vigil_server::notify::Notifier;
use vigil_server::store::{Agent, Database};
use vigil_server::telemetry::category;

const MASTER: &str = "master-pw";
const AGENT_PW: &str = "agent-pw";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), subject.into(), body.into()));
        Ok(())
    }
}

struct Fixture {
    database: Arc<Database>,
    keystore: Arc<SecretStore>,
    notifier: Arc<RecordingNotifier>,
    ingest: IngestService,
}

fn fixture() -> Fixture {
    let database = Arc::new(Database::open_in_memory().unwrap());
    let keystore = Arc::new(SecretStore::open_in_memory().unwrap());
    let mut at_rest_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut at_rest_key);
    keystore.save(AT_REST_ALIAS, &at_rest_key, MASTER).unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = AlertDispatcher::new(
        database.clone(),
        notifier.clone(),
        Importance::Medium,
        "ops@localhost",
    );
    let engine = Arc::new(AnalyzerEngine::new(
        AnalyzerRegistry::standard(&AnalyzerConfig::default()),
        database.clone(),
        keystore.clone(),
        MASTER,
        dispatcher,
        None,
    ));
    let ingest = IngestService::new(database.clone(), keystore.clone(), MASTER, engine);
    Fixture {
        database,
        keystore,
        notifier,
        ingest,
    }
}

fn register_agent(fx: &Fixture, id: &str, allowed_users: &[&str]) -> [u8; 32] {
    let agent = Agent::new(
        id,
        AGENT_PW,
        "http://127.0.0.1:1",
        allowed_users.iter().map(|s| s.to_string()).collect(),
    );
    fx.database.upsert_agent(&agent).unwrap();
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    fx.keystore.save(id, &key, AGENT_PW).unwrap();
    key
}

fn push(agent_id: &str, key: &[u8; 32], category: &str, payload: &str) -> IngestRequest {
    IngestRequest {
        agent_id: agent_id.to_string(),
        ciphertext: channel::encrypt(payload.as_bytes(), agent_id.as_bytes(), key).unwrap(),
        category: category.to_string(),
        vm_id: "vm-1".to_string(),
        observed_at: Utc::now(),
    }
}

#[test]
fn config_load_default() {
    let c = ServerConfig::load(std::path::Path::new("nonexistent.json"));
    assert_eq!(c.alerts.notify_floor, Importance::Medium);
    assert_eq!(c.analyzers.memory.medium, 80.0);
    assert!(!c.mail.enabled);
}

#[test]
fn keystore_roundtrip_and_replace() {
    let ks = SecretStore::open_in_memory().unwrap();
    let key = [7u8; 32];
    assert!(ks.save("alias-1", &key, "pw").unwrap());
    assert_eq!(ks.get("alias-1", "pw").unwrap(), Some(key));
    assert!(ks.exists("alias-1").unwrap());
    // Replacing an existing alias reports false
    assert!(!ks.save("alias-1", &[9u8; 32], "pw").unwrap());
}

#[test]
fn keystore_wrong_password_indistinguishable_from_missing() {
    let ks = SecretStore::open_in_memory().unwrap();
    ks.save("alias-1", &[7u8; 32], "right").unwrap();
    assert_eq!(ks.get("alias-1", "wrong").unwrap(), None);
    assert_eq!(ks.get("no-such-alias", "right").unwrap(), None);
}

#[test]
fn keystore_delete() {
    let ks = SecretStore::open_in_memory().unwrap();
    ks.save("alias-1", &[7u8; 32], "pw").unwrap();
    ks.delete("alias-1").unwrap();
    assert!(!ks.exists("alias-1").unwrap());
    assert_eq!(ks.get("alias-1", "pw").unwrap(), None);
}

#[test]
fn keystore_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.db");
    {
        let ks = SecretStore::open(&path).unwrap();
        ks.save("alias-1", &[7u8; 32], "pw").unwrap();
    }
    let ks = SecretStore::open(&path).unwrap();
    assert_eq!(ks.get("alias-1", "pw").unwrap(), Some([7u8; 32]));
}

#[test]
fn ingest_persists_reencrypted_payload() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    let payload = r#"{"total":100,"available":90}"#;

    let audit = fx
        .ingest
        .ingest(&push("agent-1", &key, category::MEMORY, payload))
        .unwrap();

    // Stored data is at-rest ciphertext, not the channel envelope and not
    // plaintext; decrypting it with the at-rest key recovers the payload.
    let stored = fx.database.find_audit(&audit.id).unwrap().unwrap();
    assert_ne!(stored.data, payload);
    let at_rest_key = fx.keystore.get(AT_REST_ALIAS, MASTER).unwrap().unwrap();
    assert_eq!(at_rest::decrypt(&stored.data, &at_rest_key).unwrap(), payload.as_bytes());

    // 10% used is below every threshold: no alert rows, no mail.
    assert_eq!(fx.database.count_alerts().unwrap(), 0);
    assert!(fx.notifier.messages().is_empty());

    // Activity timestamp refreshed.
    let agent = fx.database.find_agent("agent-1").unwrap().unwrap();
    assert!(agent.last_seen.is_some());
}

#[test]
fn ingest_unknown_agent_rejected() {
    let fx = fixture();
    let key = [1u8; 32];
    let err = fx
        .ingest
        .ingest(&push("ghost", &key, category::MEMORY, "{}"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownAgent(_)));
    // The boundary message leaks nothing about the failing step.
    assert_eq!(err.public_message(), "audit push rejected");
    assert_eq!(fx.database.count_audits().unwrap(), 0);
}

#[test]
fn ingest_inactive_agent_rejected() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    let mut agent = fx.database.find_agent("agent-1").unwrap().unwrap();
    agent.active = false;
    fx.database.upsert_agent(&agent).unwrap();

    let err = fx
        .ingest
        .ingest(&push("agent-1", &key, category::MEMORY, "{}"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InactiveAgent(_)));
    assert_eq!(fx.database.count_audits().unwrap(), 0);
}

#[test]
fn ingest_spoofed_sender_rejected() {
    let fx = fixture();
    register_agent(&fx, "agent-1", &[]);
    let other_key = register_agent(&fx, "agent-2", &[]);

    // Envelope sealed by agent-2 replayed under agent-1's identity.
    let mut req = push("agent-2", &other_key, category::MEMORY, r#"{"total":1,"available":1}"#);
    req.agent_id = "agent-1".to_string();

    let err = fx.ingest.ingest(&req).unwrap_err();
    assert!(matches!(err, PipelineError::Authentication(_)));
    assert_eq!(fx.database.count_audits().unwrap(), 0);
}

#[test]
fn ingest_atomicity_on_missing_at_rest_key() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    fx.keystore.delete(AT_REST_ALIAS).unwrap();

    let err = fx
        .ingest
        .ingest(&push("agent-1", &key, category::MEMORY, r#"{"total":100,"available":1}"#))
        .unwrap_err();
    assert!(matches!(err, PipelineError::KeyUnavailable(_)));
    // No audit row and no signal: nothing downstream ever saw the push.
    assert_eq!(fx.database.count_audits().unwrap(), 0);
    assert_eq!(fx.database.count_alerts().unwrap(), 0);
    assert!(fx.notifier.messages().is_empty());
}

#[test]
fn memory_pressure_alerts_and_notifies() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);

    // 80% used classifies at the default medium tier and crosses the
    // notification floor.
    fx.ingest
        .ingest(&push(
            "agent-1",
            &key,
            category::MEMORY,
            r#"{"total":100,"available":20}"#,
        ))
        .unwrap();

    let alerts = fx.database.recent_alerts(10).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].importance, Importance::Medium);
    assert_eq!(alerts[0].vm_id, "vm-1");

    let mails = fx.notifier.messages();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].0, "ops@localhost");
    assert!(mails[0].1.contains("medium"));
}

#[test]
fn malformed_payload_is_skipped_not_fatal() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);

    // Well-encrypted garbage: the pipeline persists it (ciphertext is
    // opaque), the analyzer rejects it, nothing crashes and no alert lands.
    let audit = fx
        .ingest
        .ingest(&push("agent-1", &key, category::MEMORY, "not json"))
        .unwrap();
    assert!(fx.database.find_audit(&audit.id).unwrap().is_some());
    assert_eq!(fx.database.count_alerts().unwrap(), 0);
}

#[test]
fn unregistered_category_is_ignored() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    let audit = fx
        .ingest
        .ingest(&push("agent-1", &key, "uptime", r#"{"seconds":12}"#))
        .unwrap();
    assert!(fx.database.find_audit(&audit.id).unwrap().is_some());
    assert_eq!(fx.database.count_alerts().unwrap(), 0);
}

#[test]
fn single_alert_insert_and_query() {
    let fx = fixture();
    let alert = Alert::usage("vm-9", None, Importance::Low, "disk filling".into(), Utc::now());
    fx.database.insert_alert(&alert).unwrap();
    let got = fx.database.recent_alerts(1).unwrap();
    assert_eq!(got[0].vm_id, "vm-9");
    assert_eq!(got[0].importance, Importance::Low);
    assert!(got[0].agent_id.is_none());
}

#[test]
fn retire_agent_revokes_channel_key() {
    let fx = fixture();
    register_agent(&fx, "agent-1", &[]);
    assert!(fx.keystore.exists("agent-1").unwrap());

    assert!(fx.database.retire_agent(&fx.keystore, "agent-1").unwrap());
    assert!(fx.database.find_agent("agent-1").unwrap().is_none());
    assert!(!fx.keystore.exists("agent-1").unwrap());
}

#[test]
fn audit_queries_filter_by_category_and_vm() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    fx.ingest
        .ingest(&push("agent-1", &key, category::MEMORY, r#"{"total":100,"available":90}"#))
        .unwrap();
    fx.ingest
        .ingest(&push("agent-1", &key, category::CPU_LOAD, r#"{"load_average":0.2,"logical_cores":4}"#))
        .unwrap();

    assert_eq!(fx.database.audits_by_category(category::MEMORY, 10).unwrap().len(), 1);
    assert_eq!(fx.database.audits_by_vm("vm-1", 10).unwrap().len(), 2);
    assert_eq!(fx.database.audits_by_vm("vm-2", 10).unwrap().len(), 0);
}

#[test]
fn inbox_spool_roundtrip() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    let req = push("agent-1", &key, category::MEMORY, r#"{"total":100,"available":90}"#);

    let id = fx.database.enqueue_push(&req).unwrap();
    let pending = fx.database.pending_pushes(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, id);
    assert_eq!(pending[0].1.agent_id, "agent-1");

    fx.database.ack_push(id).unwrap();
    assert!(fx.database.pending_pushes(10).unwrap().is_empty());
}

#[test]
fn retention_prunes_old_audits() {
    let fx = fixture();
    let key = register_agent(&fx, "agent-1", &[]);
    let mut req = push("agent-1", &key, category::MEMORY, r#"{"total":100,"available":90}"#);
    req.observed_at = Utc::now() - chrono::Duration::days(40);
    fx.ingest.ingest(&req).unwrap();

    let pruned = fx
        .database
        .prune_audits_before(Utc::now() - chrono::Duration::days(30))
        .unwrap();
    assert_eq!(pruned, 1);
    assert_eq!(fx.database.count_audits().unwrap(), 0);
}
