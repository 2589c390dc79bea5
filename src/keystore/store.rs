//! SQLite-backed secret store. Each entry is wrapped individually: a random
//! per-entry salt, a PBKDF2-HMAC-SHA256 KEK from the caller's password, and
//! the key bytes sealed with the channel AEAD using the alias as associated
//! data. Every write commits immediately, so a crash cannot lose a key that
//! `save` already acknowledged.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Mutex;

use rand::RngCore;
use ring::pbkdf2;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::crypto::{channel, KEY_LEN};
use crate::error::KeystoreError;

const SALT_LEN: usize = 16;
const PBKDF2_ITERS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

fn derive_kek(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERS,
        salt,
        password.as_bytes(),
        &mut out,
    );
    out
}

/// Short key fingerprint for logs; never the key itself.
fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

pub struct SecretStore {
    conn: Mutex<Connection>,
}

impl SecretStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self, KeystoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, KeystoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, KeystoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS secrets (
                alias      TEXT PRIMARY KEY,
                salt       BLOB NOT NULL,
                wrapped    TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap `key` under `password` and persist it. Returns `true` when the
    /// alias was newly created, `false` when an existing entry was replaced.
    pub fn save(
        &self,
        alias: &str,
        key: &[u8; KEY_LEN],
        password: &str,
    ) -> Result<bool, KeystoreError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let kek = derive_kek(password, &salt);
        let wrapped =
            channel::encrypt(key, alias.as_bytes(), &kek).map_err(|_| KeystoreError::Seal)?;

        let conn = self.conn.lock().expect("keystore lock");
        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM secrets WHERE alias = ?1",
                params![alias],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        conn.execute(
            "INSERT OR REPLACE INTO secrets (alias, salt, wrapped, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![alias, salt.as_slice(), wrapped, chrono::Utc::now().timestamp()],
        )?;
        info!(alias, fingerprint = %fingerprint(key), "secret saved");
        Ok(!existed)
    }

    /// Unwrap the key stored under `alias`. A wrong or absent password and a
    /// missing alias are indistinguishable: both return `Ok(None)`.
    pub fn get(&self, alias: &str, password: &str) -> Result<Option<[u8; KEY_LEN]>, KeystoreError> {
        let row: Option<(Vec<u8>, String)> = {
            let conn = self.conn.lock().expect("keystore lock");
            conn.query_row(
                "SELECT salt, wrapped FROM secrets WHERE alias = ?1",
                params![alias],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };
        let Some((salt, wrapped)) = row else {
            debug!(alias, "secret unavailable");
            return Ok(None);
        };

        let kek = derive_kek(password, &salt);
        match channel::decrypt(&wrapped, alias.as_bytes(), &kek) {
            Ok(bytes) if bytes.len() == KEY_LEN => {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                Ok(Some(key))
            }
            _ => {
                debug!(alias, "secret unavailable");
                Ok(None)
            }
        }
    }

    pub fn exists(&self, alias: &str) -> Result<bool, KeystoreError> {
        let conn = self.conn.lock().expect("keystore lock");
        let found = conn
            .query_row(
                "SELECT 1 FROM secrets WHERE alias = ?1",
                params![alias],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(found)
    }

    pub fn delete(&self, alias: &str) -> Result<(), KeystoreError> {
        let conn = self.conn.lock().expect("keystore lock");
        conn.execute("DELETE FROM secrets WHERE alias = ?1", params![alias])?;
        Ok(())
    }
}
