//! At-rest scheme: AES-256-CBC with PKCS7 padding under the server-wide key.
//!
//! Envelope layout before base64: `16-byte IV || ciphertext`. No associated
//! data and no authentication tag — this scheme only protects the
//! confidentiality of stored payloads against a leaked disk, a documented
//! weaker guarantee than the channel scheme.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use super::{check_key, check_plaintext};
use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// Encrypt a payload for storage, fresh random IV per call.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String, CryptoError> {
    check_key(key)?;
    check_plaintext(plaintext)?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let key: [u8; 32] = key.try_into().map_err(|_| CryptoError::Encrypt)?;
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(out))
}

/// Decrypt a stored payload.
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;

    let raw = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::Malformed("invalid base64"))?;
    if raw.len() < IV_LEN + 16 {
        return Err(CryptoError::Malformed("envelope too short"));
    }
    let (iv, ciphertext) = raw.split_at(IV_LEN);
    if ciphertext.len() % 16 != 0 {
        return Err(CryptoError::Malformed("ciphertext not block aligned"));
    }

    let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CryptoError::Malformed("bad iv"))?;
    let key: [u8; 32] = key
        .try_into()
        .map_err(|_| CryptoError::InvalidArgument("key must be 32 bytes"))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CryptoError::Malformed("bad padding"))?;
    Ok(plaintext.to_vec())
}
