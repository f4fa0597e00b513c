//! Error taxonomy of the provisioning engine.
//!
//! Everything a caller can act on gets its own variant; storage failures are
//! logged here with a correlation id and surface opaquely, so an embedding
//! application can show subscribers the reference instead of a driver error.

use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use provost_core::StorageError;
use provost_crypto::CryptoError;

use crate::validate::MIN_PASSWORD_LEN;

/// Errors from provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Malformed or incomplete account configuration; caller-correctable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Password policy violation; caller-correctable.
    #[error("account password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    /// No account for the given identifier.
    #[error("no account for identifier {0}")]
    NotFound(u64),

    /// Infrastructure-level failure. The cause is logged under the
    /// correlation id; the display form stays opaque.
    #[error("storage failure (ref {correlation_id})")]
    Storage {
        correlation_id: Uuid,
        #[source]
        source: StorageError,
    },

    /// The stored recoverable credential could not be decrypted.
    #[error("credential corruption: {0}")]
    Credential(#[from] CryptoError),
}

impl ProvisionError {
    /// Wrap a storage failure, logging the cause with a fresh correlation id.
    pub fn storage(source: StorageError) -> Self {
        let correlation_id = Uuid::new_v4();
        error!(%correlation_id, cause = %source, "storage failure");
        Self::Storage {
            correlation_id,
            source,
        }
    }
}

impl From<provost_core::Error> for ProvisionError {
    fn from(e: provost_core::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// A batch operation aborted part-way through.
///
/// Batches are fail-fast with at-least-partial-success semantics: rows
/// committed before the failing one stay committed and are reported here, in
/// input order.
#[derive(Debug, Error)]
#[error("batch aborted after {} committed row(s): {source}", committed.len())]
pub struct BatchError {
    /// Row identifiers committed before the failure, positionally aligned
    /// with the input.
    pub committed: Vec<u64>,
    #[source]
    pub source: ProvisionError,
}

impl BatchError {
    pub(crate) const fn new(committed: Vec<u64>, source: ProvisionError) -> Self {
        Self { committed, source }
    }
}
