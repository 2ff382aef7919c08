//! Key-management capability used to seal object payloads at rest.
//!
//! Key derivation: HKDF-SHA256(salt, master secret, key id) -> 256-bit AES key
//! Sealing: AES-256-GCM with a random 12-byte nonce
//! Envelope format: key-id length (u16 BE) || key id || nonce (12 bytes) ||
//! ciphertext (GCM tag included)
//!
//! The envelope is self-describing so `decrypt` needs only the blob: the key
//! id that sealed a payload travels inside it, and rotation of the active key
//! id only affects new uploads. Callers never see key material; the master
//! secret lives behind [`EnvelopeKeyService`] and per-object keys exist only
//! transiently inside a call.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Salt for HKDF key derivation (domain separation).
const HKDF_SALT: &[u8] = b"secure-file-store-data-key-v1";

/// Nonce size for AES-256-GCM.
const NONCE_LEN: usize = 12;

/// Key-id length prefix size in the envelope.
const KEY_ID_LEN_PREFIX: usize = 2;

#[derive(Debug, Error)]
pub enum KeyServiceError {
    #[error("key id `{0}` cannot be encoded into an envelope")]
    InvalidKeyId(String),
    #[error("master secret rejected: {0}")]
    InvalidMasterSecret(String),
    #[error("ciphertext is not a valid envelope")]
    MalformedEnvelope,
    #[error("encryption under key `{0}` failed")]
    Encrypt(String),
    #[error("decryption under key `{0}` failed")]
    Decrypt(String),
}

/// Remote key-management capability.
///
/// `encrypt` seals a payload under a named key; `decrypt` unseals a blob
/// previously produced by `encrypt` (the blob itself identifies the key).
#[async_trait]
pub trait KeyService: Send + Sync {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, KeyServiceError>;
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyServiceError>;
}

/// Key service backed by a single master secret.
///
/// Per-key-id data keys are derived with HKDF-SHA256, so distinct key ids
/// yield unrelated AES keys without storing any of them.
#[derive(Clone)]
pub struct EnvelopeKeyService {
    master: [u8; 32],
}

impl EnvelopeKeyService {
    pub fn new(master: [u8; 32]) -> Self {
        Self { master }
    }

    /// Construct from a hex-encoded 32-byte master secret, as resolved from
    /// the parameter provider at startup.
    pub fn from_hex(master_hex: &str) -> Result<Self, KeyServiceError> {
        let bytes = hex::decode(master_hex.trim())
            .map_err(|_| KeyServiceError::InvalidMasterSecret("not hex-encoded".into()))?;
        let master: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyServiceError::InvalidMasterSecret("must be 32 bytes".into()))?;
        Ok(Self { master })
    }

    /// Derive the AES-256-GCM data key for a key id.
    fn derive_data_key(&self, key_id: &str) -> Key<Aes256Gcm> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), &self.master);
        let mut okm = [0u8; 32];
        hk.expand(key_id.as_bytes(), &mut okm)
            .expect("HKDF expand cannot fail for 32-byte output");
        Key::<Aes256Gcm>::from(okm)
    }
}

#[async_trait]
impl KeyService for EnvelopeKeyService {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        let id_bytes = key_id.as_bytes();
        if id_bytes.is_empty() || id_bytes.len() > u16::MAX as usize {
            return Err(KeyServiceError::InvalidKeyId(key_id.to_string()));
        }

        let cipher = Aes256Gcm::new(&self.derive_data_key(key_id));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| KeyServiceError::Encrypt(key_id.to_string()))?;

        let mut envelope =
            Vec::with_capacity(KEY_ID_LEN_PREFIX + id_bytes.len() + NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&(id_bytes.len() as u16).to_be_bytes());
        envelope.extend_from_slice(id_bytes);
        envelope.extend_from_slice(nonce.as_slice());
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        if ciphertext.len() < KEY_ID_LEN_PREFIX {
            return Err(KeyServiceError::MalformedEnvelope);
        }
        let id_len = u16::from_be_bytes([ciphertext[0], ciphertext[1]]) as usize;
        let body = &ciphertext[KEY_ID_LEN_PREFIX..];
        if id_len == 0 || body.len() < id_len + NONCE_LEN {
            return Err(KeyServiceError::MalformedEnvelope);
        }

        let key_id = std::str::from_utf8(&body[..id_len])
            .map_err(|_| KeyServiceError::MalformedEnvelope)?
            .to_string();
        let nonce = Nonce::from_slice(&body[id_len..id_len + NONCE_LEN]);
        let sealed = &body[id_len + NONCE_LEN..];

        let cipher = Aes256Gcm::new(&self.derive_data_key(&key_id));
        cipher
            .decrypt(nonce, sealed)
            .map_err(|_| KeyServiceError::Decrypt(key_id))
    }
}
