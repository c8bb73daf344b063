//! At-rest encryption for the credential record.
//!
//! The token file is the only secret this service persists, and a leaked
//! refresh token grants standing Drive access. When a passphrase is
//! configured, the record is sealed into an envelope: Argon2id derives a key
//! from the passphrase and a random salt, and XChaCha20-Poly1305 seals the
//! JSON body with a random 24-byte nonce. Both salt and nonce are regenerated
//! on every write.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore as _;
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, DriveResult};

/// Derived key length in bytes.
const KEY_LENGTH: usize = 32;

/// Salt length in bytes.
const SALT_LENGTH: usize = 16;

/// XChaCha20-Poly1305 nonce length in bytes.
const NONCE_LENGTH: usize = 24;

/// Current envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Argon2id cost parameters (19 MiB, 2 passes, single lane).
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// On-disk envelope for an encrypted credential record.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    salt: String,
    nonce: String,
    ciphertext: String,
}

fn derive_key(passphrase: &str, salt: &[u8]) -> DriveResult<[u8; KEY_LENGTH]> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| DriveError::internal(format!("invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| DriveError::internal(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

/// Seals `plaintext` under `passphrase` into a JSON envelope string.
pub(crate) fn seal(passphrase: &str, plaintext: &[u8]) -> DriveResult<String> {
    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    rand::rng().fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| DriveError::internal(format!("encryption failed: {}", e)))?;

    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
    };

    serde_json::to_string_pretty(&envelope)
        .map_err(|e| DriveError::internal(format!("failed to serialize envelope: {}", e)))
}

/// Opens a JSON envelope string sealed by [`seal`].
///
/// A failed authentication tag means the passphrase is wrong or the record
/// was tampered with; either way the credential is unrecoverable and the
/// user must re-authorize.
pub(crate) fn open(passphrase: &str, data: &str) -> DriveResult<Vec<u8>> {
    let envelope: Envelope = serde_json::from_str(data)
        .map_err(|e| DriveError::configuration(format!("invalid token envelope: {}", e)))?;

    if envelope.version != ENVELOPE_VERSION {
        return Err(DriveError::configuration(format!(
            "unsupported token envelope version {}",
            envelope.version
        )));
    }

    let salt = BASE64
        .decode(&envelope.salt)
        .map_err(|e| DriveError::configuration(format!("invalid envelope salt: {}", e)))?;
    let nonce = BASE64
        .decode(&envelope.nonce)
        .map_err(|e| DriveError::configuration(format!("invalid envelope nonce: {}", e)))?;
    let ciphertext = BASE64
        .decode(&envelope.ciphertext)
        .map_err(|e| DriveError::configuration(format!("invalid envelope ciphertext: {}", e)))?;

    if nonce.len() != NONCE_LENGTH {
        return Err(DriveError::configuration("invalid envelope nonce length"));
    }

    let key = derive_key(passphrase, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| {
            DriveError::configuration(
                "failed to decrypt token record (wrong passphrase or corrupted file)",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open_round_trip() {
        let sealed = seal("hunter2", b"{\"access_token\":\"abc\"}").unwrap();
        let opened = open("hunter2", &sealed).unwrap();
        assert_eq!(opened, b"{\"access_token\":\"abc\"}");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let sealed = seal("hunter2", b"secret").unwrap();
        let err = open("not-hunter2", &sealed).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let sealed = seal("hunter2", b"secret").unwrap();
        let mut envelope: Envelope = serde_json::from_str(&sealed).unwrap();
        let mut raw = BASE64.decode(&envelope.ciphertext).unwrap();
        raw[0] ^= 0xff;
        envelope.ciphertext = BASE64.encode(raw);
        let tampered = serde_json::to_string(&envelope).unwrap();
        assert!(open("hunter2", &tampered).is_err());
    }

    #[test]
    fn salt_and_nonce_are_fresh_per_seal() {
        let a: Envelope = serde_json::from_str(&seal("p", b"x").unwrap()).unwrap();
        let b: Envelope = serde_json::from_str(&seal("p", b"x").unwrap()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn garbage_envelope_is_rejected() {
        assert!(open("p", "not json").is_err());
        assert!(open("p", "{\"version\":9,\"salt\":\"\",\"nonce\":\"\",\"ciphertext\":\"\"}").is_err());
    }
}
