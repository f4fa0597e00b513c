//! `provost` Credential Library
//!
//! Cryptographic primitives for subscriber credentials. Every account keeps
//! two representations of its password, always written together:
//!
//! - **Verification hash**: SHA-224, hex-encoded. One-way, deterministic and
//!   unsalted; it doubles as the lookup key for inbound protocol
//!   connections, so the same plaintext must always map to the same hash.
//! - **Recoverable form**: ChaCha20-Poly1305 AEAD under a process-wide key,
//!   so the plaintext can be reconstructed for display and export.
//!
//! Suspension is implemented by *masking*: overwriting the verification hash
//! with random bytes of the same shape, which makes the account unreachable
//! without touching the recoverable form.

pub mod error;
pub mod vault;

pub use error::CryptoError;
pub use vault::{CredentialPair, CredentialVault, HASH_LEN, random_mask};
