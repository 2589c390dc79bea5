//! Vigil server entrypoint: opens the keystore and database, builds the
//! analyzer registry, spawns the intrusion response worker, then drains the
//! inbound spool through the pipeline and prunes expired audits on a fixed
//! cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use vigil_server::analyzers::AnalyzerRegistry;
use vigil_server::config::{RetentionConfig, ServerConfig};
use vigil_server::keystore::{SecretStore, AT_REST_ALIAS, JWT_SIGNING_ALIAS};
use vigil_server::notify::{NoopNotifier, Notifier, SmtpMailer};
use vigil_server::response::{self, IntrusionResponder};
use vigil_server::{AlertDispatcher, AnalyzerEngine, Database, IngestService, StructuredLogger};

fn ensure_key(
    keystore: &SecretStore,
    alias: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if keystore.exists(alias)? {
        return Ok(());
    }
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    keystore.save(alias, &key, password)?;
    info!(alias, "generated key");
    Ok(())
}

fn run_one_cycle(
    ingest: &IngestService,
    database: &Database,
    retention: &RetentionConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pending = database.pending_pushes(retention.inbox_batch)?;
    for (inbox_id, push) in pending {
        if let Err(e) = ingest.ingest(&push) {
            // The transport already answered the agent with the generic
            // rejection; the specific variant stays in our logs.
            warn!(
                agent_id = %push.agent_id,
                category = %push.category,
                error = %e,
                "push rejected"
            );
        }
        database.ack_push(inbox_id)?;
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention.audit_days);
    let pruned = database.prune_audits_before(cutoff)?;
    if pruned > 0 {
        info!(pruned, "expired audits pruned");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("VIGIL_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = ServerConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "vigil server starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let keystore = Arc::new(SecretStore::open(
        &config.data_dir.join(&config.keystore.file),
    )?);
    // First run: mint the server-wide keys. Agent channel keys arrive through
    // the registration flow, not here.
    ensure_key(&keystore, AT_REST_ALIAS, &config.keystore.master_password)?;
    ensure_key(&keystore, JWT_SIGNING_ALIAS, &config.keystore.master_password)?;

    let database = Arc::new(Database::open(&config.data_dir.join("vigil.db"))?);

    let notifier: Arc<dyn Notifier> = if config.mail.enabled {
        Arc::new(SmtpMailer::new(&config.mail)?)
    } else {
        Arc::new(NoopNotifier)
    };

    let responder = IntrusionResponder::new(
        &config.response,
        keystore.clone(),
        notifier.clone(),
        config.alerts.operator_email.clone(),
    )?;
    let (response_tx, worker) = response::spawn(responder, database.clone())?;

    let registry = AnalyzerRegistry::standard(&config.analyzers);
    info!(categories = registry.categories(), "analyzer registry built");

    let dispatcher = AlertDispatcher::new(
        database.clone(),
        notifier,
        config.alerts.notify_floor,
        config.alerts.operator_email.clone(),
    );
    let engine = Arc::new(AnalyzerEngine::new(
        registry,
        database.clone(),
        keystore.clone(),
        config.keystore.master_password.clone(),
        dispatcher,
        Some(response_tx),
    ));
    let ingest = IngestService::new(
        database.clone(),
        keystore,
        config.keystore.master_password.clone(),
        engine,
    );

    let interval_secs = config.retention.cycle_secs;
    let run_daemon = interval_secs > 0;

    if run_daemon {
        info!(interval_secs, "daemon mode (Ctrl+C to stop)");
        static STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
        let _ = ctrlc::set_handler(|| {
            STOP.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        let mut cycle: u64 = 0;
        while !STOP.load(std::sync::atomic::Ordering::Relaxed) {
            cycle += 1;
            if let Err(e) = run_one_cycle(&ingest, &database, &config.retention) {
                warn!(cycle, error = %e, "cycle failed");
            }
            for _ in 0..(interval_secs as u32) {
                if STOP.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        }
        info!("vigil server stopping");
    } else {
        run_one_cycle(&ingest, &database, &config.retention)?;
        info!("single cycle complete");
    }

    // Dropping the service drops the engine's channel sender; the worker
    // loop sees the disconnect and exits.
    drop(ingest);
    let _ = worker.join();

    Ok(())
}
