//! Envelope crypto for telemetry payloads.
//!
//! Two deliberately different schemes:
//! - [`channel`] — AES-256-GCM for agent↔server transit, bound to the
//!   sending agent's identity as associated data. Tampering, truncation, or
//!   a mismatched identity fails authentication.
//! - [`at_rest`] — AES-256-CBC for stored payloads under the server-wide
//!   at-rest key. Confidentiality only; the threat model is a leaked disk,
//!   not an adversary feeding tampered rows back through the pipeline.
//!
//! Both produce self-describing, base64-transportable envelopes (associated
//! data, nonce, and IV prefixes are not secret).

pub mod at_rest;
pub mod channel;

pub use crate::error::CryptoError;

/// All keys handled by the server are 256-bit.
pub const KEY_LEN: usize = 32;

pub(crate) fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidArgument("key must be 32 bytes"));
    }
    Ok(())
}

pub(crate) fn check_plaintext(plaintext: &[u8]) -> Result<(), CryptoError> {
    if plaintext.is_empty() {
        return Err(CryptoError::InvalidArgument("empty plaintext"));
    }
    Ok(())
}
