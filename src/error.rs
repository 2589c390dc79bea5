//! Typed failure taxonomy for the ingestion pipeline and its collaborators.

use thiserror::Error;

/// Envelope crypto failures.
///
/// `Authentication` (bad tag: wrong key, wrong associated data, or tampered
/// ciphertext) is kept distinct from `Malformed` (envelope does not parse) so
/// callers can tell "wrong key" from "corrupted record".
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Caller contract violation (empty key or plaintext), not a crypto failure.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// AEAD tag verification failed.
    #[error("authentication failed")]
    Authentication,

    /// Envelope too short, bad base64, or bad padding.
    #[error("malformed ciphertext: {0}")]
    Malformed(&'static str),

    /// Cipher refused to encrypt.
    #[error("encryption failed")]
    Encrypt,
}

/// Secret-store failures.
///
/// Wrong password and missing alias are deliberately NOT errors: both surface
/// as `Ok(None)` from `SecretStore::get` so callers cannot distinguish the
/// two failure modes.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("keystore storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("keystore sealing error")]
    Seal,
}

/// One typed outcome per ingested push. Any variant aborts the push with no
/// partial state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent is inactive: {0}")]
    InactiveAgent(String),

    /// Secret-store miss: wrong credential or missing alias, treated identically.
    #[error("channel or at-rest key unavailable for '{0}'")]
    KeyUnavailable(String),

    /// Channel decrypt failed authentication: tampering or wrong key.
    #[error("payload authentication failed for agent {0}")]
    Authentication(String),

    /// At-rest re-encryption failed.
    #[error("at-rest encryption failed")]
    Encryption,

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("keystore failure: {0}")]
    Keystore(#[from] KeystoreError),
}

impl PipelineError {
    /// Generic agent-facing rejection. Internal logs keep the specific
    /// variant; the boundary must not reveal which step failed.
    pub fn public_message(&self) -> &'static str {
        "audit push rejected"
    }
}

/// Failure scoped to a single analyzer run over a single audit. Never aborts
/// other analyzers or other items in the same audit.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("malformed payload for category '{category}': {reason}")]
    MalformedPayload { category: String, reason: String },
}

/// Failure of one analysis pass over a persisted audit. The stored ciphertext
/// is never touched by a failing pass.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("at-rest key unavailable")]
    KeyUnavailable,

    #[error("at-rest decrypt failed: {0}")]
    Decrypt(#[from] CryptoError),

    #[error("alert storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("keystore failure: {0}")]
    Keystore(#[from] KeystoreError),
}

/// Notification transport failure. Logged by callers, never propagated past
/// dispatch.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail build error: {0}")]
    Build(String),

    #[error("mail transport error: {0}")]
    Transport(String),
}
