//! Credential vault: verification hashes, recoverable encryption, masking.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha224};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of a hex-encoded SHA-224 verification hash.
pub const HASH_LEN: usize = 56;

/// Nonce size for ChaCha20-Poly1305.
const NONCE_SIZE: usize = 12;

/// Both stored representations of one password, derived together.
///
/// This is the only constructor of the pair; keeping a single writer is what
/// guarantees the hash stays derivable from the recoverable form.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    /// Hex-encoded SHA-224 of the plaintext.
    pub verification_hash: String,
    /// Hex-encoded `nonce || ciphertext` of the plaintext.
    pub recoverable: String,
}

/// A vault holding the process-wide credential key.
pub struct CredentialVault {
    cipher: ChaCha20Poly1305,
}

impl CredentialVault {
    /// Create a vault from a raw 32-byte key.
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let key = Key::from_slice(key_bytes);
        Self {
            cipher: ChaCha20Poly1305::new(key),
        }
    }

    /// Create a vault from a hex-encoded 32-byte key.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CryptoError> {
        let mut decoded = hex::decode(hex_key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: hex_key.len() / 2,
        })?;
        if decoded.len() != 32 {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual,
            });
        }
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        let vault = Self::new(&key_bytes);
        key_bytes.zeroize();
        Ok(vault)
    }

    /// SHA-224 verification hash of a plaintext password, hex-encoded.
    ///
    /// Deterministic and unsalted: the hash is the connection-routing key,
    /// so identical plaintexts must produce identical hashes.
    pub fn hash(&self, plaintext: &str) -> String {
        hex::encode(Sha224::digest(plaintext.as_bytes()))
    }

    /// Encrypt a plaintext password into its recoverable form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Decrypt a recoverable form back into the plaintext password.
    pub fn decrypt(&self, recoverable: &str) -> Result<String, CryptoError> {
        let raw = hex::decode(recoverable)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        if raw.len() <= NONCE_SIZE {
            return Err(CryptoError::DecryptionFailed(
                "recoverable form too short".into(),
            ));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// Derive both stored representations from a plaintext password.
    pub fn derive_pair(&self, plaintext: &str) -> Result<CredentialPair, CryptoError> {
        Ok(CredentialPair {
            verification_hash: self.hash(plaintext),
            recoverable: self.encrypt(plaintext)?,
        })
    }

    /// Constant-time check that `plaintext` hashes to `stored_hash`.
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        self.hash(plaintext)
            .as_bytes()
            .ct_eq(stored_hash.as_bytes())
            .into()
    }
}

/// A cryptographically random value with the exact shape of a verification
/// hash. Written over the stored hash to suspend an account: no plaintext
/// hashes to it, so protocol lookups can no longer reach the row.
pub fn random_mask() -> String {
    let mut raw = [0u8; HASH_LEN / 2];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}
