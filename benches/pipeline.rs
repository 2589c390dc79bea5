//! Pipeline benchmark: one encrypted push through decrypt, re-encrypt,
//! persist, and analysis.

use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::RngCore;

use vigil_server::alert::{AlertDispatcher, Importance};
use vigil_server::analyzers::{AnalyzerEngine, AnalyzerRegistry};
use vigil_server::config::AnalyzerConfig;
use vigil_server::crypto::channel;
use vigil_server::ingest::{IngestRequest, IngestService};
use vigil_server::keystore::{SecretStore, AT_REST_ALIAS};
use vigil_server::notify::NoopNotifier;
use vigil_server::store::{Agent, Database};
use vigil_server::telemetry::category;

fn bench_ingest(c: &mut Criterion) {
    let database = Arc::new(Database::open_in_memory().unwrap());
    let keystore = Arc::new(SecretStore::open_in_memory().unwrap());
    let mut at_rest_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut at_rest_key);
    keystore.save(AT_REST_ALIAS, &at_rest_key, "master").unwrap();

    let agent = Agent::new("agent-bench", "agent-pw", "http://127.0.0.1:1", vec![]);
    database.upsert_agent(&agent).unwrap();
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    keystore.save("agent-bench", &key, "agent-pw").unwrap();

    let dispatcher = AlertDispatcher::new(
        database.clone(),
        Arc::new(NoopNotifier),
        Importance::Medium,
        "ops@localhost",
    );
    let engine = Arc::new(AnalyzerEngine::new(
        AnalyzerRegistry::standard(&AnalyzerConfig::default()),
        database.clone(),
        keystore.clone(),
        "master",
        dispatcher,
        None,
    ));
    let ingest = IngestService::new(database, keystore, "master", engine);

    let payload = br#"{"total":16000000000,"available":12000000000}"#;
    let request = IngestRequest {
        agent_id: "agent-bench".to_string(),
        ciphertext: channel::encrypt(payload, b"agent-bench", &key).unwrap(),
        category: category::MEMORY.to_string(),
        vm_id: "vm-bench".to_string(),
        observed_at: Utc::now(),
    };

    c.bench_function("ingest_memory_push", |b| {
        b.iter(|| black_box(ingest.ingest(black_box(&request))).unwrap())
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
