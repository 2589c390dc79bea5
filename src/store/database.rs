//! SQLite persistence over a single serialized connection.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info};

use super::{Agent, Audit};
use crate::alert::{Alert, AlertKind, Importance};
use crate::ingest::IngestRequest;
use crate::keystore::SecretStore;

fn ts_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audits (
                id         TEXT PRIMARY KEY,
                agent_id   TEXT,
                vm_id      TEXT NOT NULL,
                category   TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                data       TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audits_created ON audits(created_at);
            CREATE INDEX IF NOT EXISTS idx_audits_category ON audits(category);
            CREATE INDEX IF NOT EXISTS idx_audits_vm ON audits(vm_id);
            CREATE TABLE IF NOT EXISTS alerts (
                id         TEXT PRIMARY KEY,
                vm_id      TEXT NOT NULL,
                agent_id   TEXT,
                importance TEXT NOT NULL,
                kind       TEXT NOT NULL,
                user       TEXT,
                message    TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS agents (
                id            TEXT PRIMARY KEY,
                credential    TEXT NOT NULL,
                callback_addr TEXT NOT NULL,
                allowed_users TEXT NOT NULL,
                active        INTEGER NOT NULL,
                created_at    INTEGER NOT NULL,
                last_seen     INTEGER
            );
            CREATE TABLE IF NOT EXISTS inbox (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                payload_json TEXT NOT NULL,
                received_at  INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -- audits ------------------------------------------------------------

    pub fn insert_audit(&self, audit: &Audit) -> Result<(), rusqlite::Error> {
        self.conn.lock().expect("db lock").execute(
            "INSERT INTO audits (id, agent_id, vm_id, category, created_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                audit.id,
                audit.agent_id,
                audit.vm_id,
                audit.category,
                audit.created_at.timestamp_millis(),
                audit.data
            ],
        )?;
        Ok(())
    }

    pub fn find_audit(&self, id: &str) -> Result<Option<Audit>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        conn.query_row(
            "SELECT id, agent_id, vm_id, category, created_at, data FROM audits WHERE id = ?1",
            params![id],
            audit_from_row,
        )
        .optional()
    }

    pub fn audits_by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Audit>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, vm_id, category, created_at, data FROM audits
             WHERE category = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![category, limit], audit_from_row)?;
        rows.collect()
    }

    pub fn audits_by_vm(&self, vm_id: &str, limit: usize) -> Result<Vec<Audit>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, vm_id, category, created_at, data FROM audits
             WHERE vm_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![vm_id, limit], audit_from_row)?;
        rows.collect()
    }

    pub fn count_audits(&self) -> Result<u64, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        conn.query_row("SELECT COUNT(*) FROM audits", [], |row| row.get(0))
    }

    /// Retention: delete audits older than `cutoff`.
    pub fn prune_audits_before(&self, cutoff: DateTime<Utc>) -> Result<u64, rusqlite::Error> {
        let n = self.conn.lock().expect("db lock").execute(
            "DELETE FROM audits WHERE created_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(n as u64)
    }

    // -- alerts ------------------------------------------------------------

    pub fn insert_alert(&self, alert: &Alert) -> Result<(), rusqlite::Error> {
        self.insert_alerts(std::slice::from_ref(alert))
    }

    /// Batch insert, one transaction.
    pub fn insert_alerts(&self, alerts: &[Alert]) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        let tx = conn.unchecked_transaction()?;
        for alert in alerts {
            tx.execute(
                "INSERT INTO alerts (id, vm_id, agent_id, importance, kind, user, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    alert.id,
                    alert.vm_id,
                    alert.agent_id,
                    alert.importance.as_str(),
                    alert.kind.as_str(),
                    alert.user,
                    alert.message,
                    alert.created_at.timestamp_millis()
                ],
            )?;
        }
        tx.commit()
    }

    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        let mut stmt = conn.prepare(
            "SELECT id, vm_id, agent_id, importance, kind, user, message, created_at
             FROM alerts ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], alert_from_row)?;
        rows.collect()
    }

    pub fn count_alerts(&self) -> Result<u64, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))
    }

    // -- agent directory ---------------------------------------------------

    pub fn upsert_agent(&self, agent: &Agent) -> Result<(), rusqlite::Error> {
        let allowed = serde_json::to_string(&agent.allowed_users).unwrap_or_else(|_| "[]".into());
        self.conn.lock().expect("db lock").execute(
            "INSERT OR REPLACE INTO agents
             (id, credential, callback_addr, allowed_users, active, created_at, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                agent.id,
                agent.credential,
                agent.callback_addr,
                allowed,
                agent.active,
                agent.created_at.timestamp_millis(),
                agent.last_seen.map(|t| t.timestamp_millis())
            ],
        )?;
        Ok(())
    }

    pub fn find_agent(&self, id: &str) -> Result<Option<Agent>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        conn.query_row(
            "SELECT id, credential, callback_addr, allowed_users, active, created_at, last_seen
             FROM agents WHERE id = ?1",
            params![id],
            agent_from_row,
        )
        .optional()
    }

    /// Refresh the agent's activity timestamp after a successful ingest.
    pub fn touch_agent(&self, id: &str, when: DateTime<Utc>) -> Result<(), rusqlite::Error> {
        self.conn.lock().expect("db lock").execute(
            "UPDATE agents SET last_seen = ?2 WHERE id = ?1",
            params![id, when.timestamp_millis()],
        )?;
        Ok(())
    }

    /// Delete an agent and cascade deletion of its channel key: no orphaned
    /// key material survives the agent.
    pub fn retire_agent(&self, keystore: &SecretStore, id: &str) -> Result<bool, rusqlite::Error> {
        let removed = self
            .conn
            .lock()
            .expect("db lock")
            .execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        if let Err(e) = keystore.delete(id) {
            error!(agent_id = id, error = %e, "channel key revocation failed");
        }
        if removed > 0 {
            info!(agent_id = id, "agent retired, channel key revoked");
        }
        Ok(removed > 0)
    }

    // -- inbox spool -------------------------------------------------------

    /// Durably park an inbound push for the daemon loop. The fast path for
    /// the transport layer.
    pub fn enqueue_push(&self, push: &IngestRequest) -> Result<i64, rusqlite::Error> {
        let payload = serde_json::to_string(push).map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(e))
        })?;
        let conn = self.conn.lock().expect("db lock");
        conn.execute(
            "INSERT INTO inbox (payload_json, received_at) VALUES (?1, ?2)",
            params![payload, Utc::now().timestamp_millis()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Read up to `limit` pending pushes in arrival order. Entries that no
    /// longer parse are deleted on the spot so they cannot wedge the queue.
    pub fn pending_pushes(&self, limit: usize) -> Result<Vec<(i64, IngestRequest)>, rusqlite::Error> {
        let conn = self.conn.lock().expect("db lock");
        let mut stmt =
            conn.prepare("SELECT id, payload_json FROM inbox ORDER BY id LIMIT ?1")?;
        let rows: Vec<(i64, String)> = stmt
            .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str::<IngestRequest>(&json) {
                Ok(push) => out.push((id, push)),
                Err(e) => {
                    error!(inbox_id = id, error = %e, "unparseable inbox entry dropped");
                    conn.execute("DELETE FROM inbox WHERE id = ?1", params![id])?;
                }
            }
        }
        Ok(out)
    }

    /// Remove an inbox entry once its pipeline run has returned.
    pub fn ack_push(&self, id: i64) -> Result<(), rusqlite::Error> {
        self.conn
            .lock()
            .expect("db lock")
            .execute("DELETE FROM inbox WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn audit_from_row(row: &rusqlite::Row<'_>) -> Result<Audit, rusqlite::Error> {
    Ok(Audit {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        vm_id: row.get(2)?,
        category: row.get(3)?,
        created_at: ts_utc(row.get(4)?),
        data: row.get(5)?,
    })
}

fn alert_from_row(row: &rusqlite::Row<'_>) -> Result<Alert, rusqlite::Error> {
    let importance: String = row.get(3)?;
    let kind: String = row.get(4)?;
    Ok(Alert {
        id: row.get(0)?,
        vm_id: row.get(1)?,
        agent_id: row.get(2)?,
        importance: match importance.as_str() {
            "critical" => Importance::Critical,
            "medium" => Importance::Medium,
            "low" => Importance::Low,
            _ => Importance::None,
        },
        kind: match kind.as_str() {
            "intrusion" => AlertKind::Intrusion,
            _ => AlertKind::Usage,
        },
        user: row.get(5)?,
        message: row.get(6)?,
        created_at: ts_utc(row.get(7)?),
    })
}

fn agent_from_row(row: &rusqlite::Row<'_>) -> Result<Agent, rusqlite::Error> {
    let allowed: String = row.get(3)?;
    let last_seen: Option<i64> = row.get(6)?;
    Ok(Agent {
        id: row.get(0)?,
        credential: row.get(1)?,
        callback_addr: row.get(2)?,
        allowed_users: serde_json::from_str(&allowed).unwrap_or_default(),
        active: row.get(4)?,
        created_at: ts_utc(row.get(5)?),
        last_seen: last_seen.map(ts_utc),
    })
}
