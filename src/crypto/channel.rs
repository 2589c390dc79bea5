//! Channel scheme: AES-256-GCM with the agent identity as associated data.
//!
//! Envelope layout before base64: `u16-be aad_len || aad || 12-byte nonce ||
//! ciphertext+tag`. The aad and nonce prefixes are not secret; decryption
//! authenticates against the *caller-supplied* aad, so an envelope replayed
//! under a different agent identity fails the tag check.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use super::{check_key, check_plaintext};
use crate::error::CryptoError;

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` for transit, binding it to `aad` (the agent id).
pub fn encrypt(plaintext: &[u8], aad: &[u8], key: &[u8]) -> Result<String, CryptoError> {
    check_key(key)?;
    check_plaintext(plaintext)?;
    if aad.is_empty() || aad.len() > u16::MAX as usize {
        return Err(CryptoError::InvalidArgument("associated data must be 1-65535 bytes"));
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(2 + aad.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&(aad.len() as u16).to_be_bytes());
    out.extend_from_slice(aad);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(out))
}

/// Decrypt a transit envelope. `aad` must be the identity the key was looked
/// up by; any mismatch, wrong key, or tampered byte fails with
/// [`CryptoError::Authentication`].
pub fn decrypt(encoded: &str, aad: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;
    if aad.is_empty() {
        return Err(CryptoError::InvalidArgument("associated data must not be empty"));
    }

    let raw = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::Malformed("invalid base64"))?;
    if raw.len() < 2 {
        return Err(CryptoError::Malformed("envelope too short"));
    }
    let aad_len = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    // Tag adds 16 bytes, so the body can never be shorter than this.
    if raw.len() < 2 + aad_len + NONCE_LEN + 16 {
        return Err(CryptoError::Malformed("envelope too short"));
    }
    let (nonce, ciphertext) = raw[2 + aad_len..].split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        [0x42; 32]
    }

    #[test]
    fn roundtrip() {
        let ct = encrypt(b"cpu: 93.1", b"agent-1", &key()).unwrap();
        let pt = decrypt(&ct, b"agent-1", &key()).unwrap();
        assert_eq!(pt, b"cpu: 93.1");
    }

    #[test]
    fn unique_nonce_per_call() {
        let c1 = encrypt(b"same", b"agent-1", &key()).unwrap();
        let c2 = encrypt(b"same", b"agent-1", &key()).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn wrong_aad_fails_authentication() {
        let ct = encrypt(b"data", b"agent-1", &key()).unwrap();
        let err = decrypt(&ct, b"agent-2", &key()).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let ct = encrypt(b"data", b"agent-1", &key()).unwrap();
        let err = decrypt(&ct, b"agent-1", &[0x7A; 32]).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn flipped_byte_fails_authentication() {
        let ct = encrypt(b"data", b"agent-1", &key()).unwrap();
        let mut raw = BASE64.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);
        let err = decrypt(&tampered, b"agent-1", &key()).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        let err = decrypt("AAAA", b"agent-1", &key()).unwrap_err();
        assert!(matches!(err, CryptoError::Malformed(_)));
    }

    #[test]
    fn garbage_is_malformed_not_authentication() {
        let err = decrypt("not base64!!", b"agent-1", &key()).unwrap_err();
        assert!(matches!(err, CryptoError::Malformed(_)));
    }

    #[test]
    fn empty_plaintext_is_invalid_argument() {
        let err = encrypt(b"", b"agent-1", &key()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidArgument(_)));
    }

    #[test]
    fn short_key_is_invalid_argument() {
        let err = encrypt(b"data", b"agent-1", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidArgument(_)));
    }
}
