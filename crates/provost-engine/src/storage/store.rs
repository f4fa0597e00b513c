//! The storage seam the engine drives.

use async_trait::async_trait;

use provost_core::StorageError;

use super::models::{AccountPatch, AccountRow, NewAccount, RowCredential, RowUsage};

/// Row-level operations the provisioning engine needs from its relational
/// store.
///
/// [`MySqlStore`](super::MySqlStore) is the production implementation; the
/// test suite drives the same trait through an in-memory double. Methods
/// returning a row count report rows *matched and changed*: MySQL reports
/// zero for value-preserving updates, so callers needing an existence check
/// must make one explicitly.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert one account row. Returns the driver-reported generated
    /// identifier, or 0 when the driver does not report one.
    async fn insert_account(&self, account: NewAccount<'_>) -> Result<u64, StorageError>;

    /// Look up a row id by the natural key of a just-inserted row.
    async fn find_row_id(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<u64>, StorageError>;

    async fn fetch_by_serial(&self, serial: u64) -> Result<Option<AccountRow>, StorageError>;

    async fn fetch_encrypted_password(&self, serial: u64)
    -> Result<Option<String>, StorageError>;

    /// Apply a patch to the account with the given serial number.
    async fn update_by_serial(
        &self,
        serial: u64,
        patch: &AccountPatch,
    ) -> Result<u64, StorageError>;

    /// Apply a patch to a row by its identifier.
    async fn update_by_row(&self, id: u64, patch: &AccountPatch) -> Result<u64, StorageError>;

    /// Overwrite the verification hash alone. This is the masking path used
    /// by suspend/unsuspend; every other hash write carries the full
    /// credential pair.
    async fn set_password_hash(
        &self,
        serial: u64,
        password_hash: &str,
    ) -> Result<u64, StorageError>;

    /// Zero the usage counters and stamp a new last-refresh time.
    async fn reset_usage(&self, serial: u64, now: i64) -> Result<u64, StorageError>;

    /// Hard delete. Returns the number of rows removed.
    async fn delete_by_serial(&self, serial: u64) -> Result<u64, StorageError>;

    /// Hard delete by row id. Returns the number of rows removed.
    async fn delete_by_row(&self, id: u64) -> Result<u64, StorageError>;

    async fn row_credential(&self, id: u64) -> Result<Option<RowCredential>, StorageError>;

    async fn row_usage(&self, id: u64) -> Result<Option<RowUsage>, StorageError>;
}
