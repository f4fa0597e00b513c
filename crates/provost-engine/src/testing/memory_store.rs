//! In-memory account store for tests.
//!
//! Mirrors the MySQL store's observable behavior: generated row ids, the
//! unique index on the verification hash, and zero rows affected for misses.
//! The `yield_insert_ids(false)` knob simulates driver configurations that
//! do not report generated identifiers, which is what the insert-capability
//! probe exists for.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use provost_core::StorageError;

use crate::storage::{
    AccountPatch, AccountRow, AccountStore, NewAccount, RowCredential, RowUsage,
};

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<u64, AccountRow>,
    next_id: u64,
}

/// HashMap-backed [`AccountStore`] that doesn't persist data.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    yield_insert_ids: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            yield_insert_ids: AtomicBool::new(true),
        }
    }

    /// When `false`, inserts report 0 as the generated identifier, the way
    /// some proxy layers and driver configurations do.
    pub fn yield_insert_ids(&self, enabled: bool) {
        self.yield_insert_ids.store(enabled, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    /// Snapshot of all rows, in id order.
    pub fn rows(&self) -> Vec<AccountRow> {
        self.lock().rows.values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(row: &mut AccountRow, patch: &AccountPatch) {
    if let Some(username) = &patch.username {
        row.username.clone_from(username);
    }
    if let Some(pair) = &patch.credentials {
        row.password_hash.clone_from(&pair.verification_hash);
        row.password_encrypted.clone_from(&pair.recoverable);
    }
    if let Some(quota) = patch.quota {
        row.quota = quota;
    }
    if let Some(download) = patch.download {
        row.download = download;
    }
    if let Some(upload) = patch.upload {
        row.upload = upload;
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: NewAccount<'_>) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        if inner
            .rows
            .values()
            .any(|row| row.password_hash == account.password_hash)
        {
            return Err(StorageError::Constraint(format!(
                "duplicate verification hash {:?}",
                account.password_hash
            )));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            id,
            AccountRow {
                id,
                username: account.username.to_string(),
                password_hash: account.password_hash.to_string(),
                quota: account.quota,
                download: 0,
                upload: 0,
                product_serial_number: account.product_serial_number,
                password_encrypted: account.password_encrypted.to_string(),
                last_refresh: account.last_refresh,
            },
        );
        if self.yield_insert_ids.load(Ordering::SeqCst) {
            Ok(id)
        } else {
            Ok(0)
        }
    }

    async fn find_row_id(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<u64>, StorageError> {
        Ok(self
            .lock()
            .rows
            .values()
            .find(|row| row.username == username && row.password_hash == password_hash)
            .map(|row| row.id))
    }

    async fn fetch_by_serial(&self, serial: u64) -> Result<Option<AccountRow>, StorageError> {
        Ok(self
            .lock()
            .rows
            .values()
            .find(|row| row.product_serial_number == serial)
            .cloned())
    }

    async fn fetch_encrypted_password(
        &self,
        serial: u64,
    ) -> Result<Option<String>, StorageError> {
        Ok(self
            .fetch_by_serial(serial)
            .await?
            .map(|row| row.password_encrypted))
    }

    async fn update_by_serial(
        &self,
        serial: u64,
        patch: &AccountPatch,
    ) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let Some(id) = inner
            .rows
            .values()
            .find(|row| row.product_serial_number == serial)
            .map(|row| row.id)
        else {
            return Ok(0);
        };
        if let Some(row) = inner.rows.get_mut(&id) {
            apply(row, patch);
        }
        Ok(1)
    }

    async fn update_by_row(&self, id: u64, patch: &AccountPatch) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        match inner.rows.get_mut(&id) {
            Some(row) => {
                apply(row, patch);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn set_password_hash(
        &self,
        serial: u64,
        password_hash: &str,
    ) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let Some(id) = inner
            .rows
            .values()
            .find(|row| row.product_serial_number == serial)
            .map(|row| row.id)
        else {
            return Ok(0);
        };
        if inner
            .rows
            .values()
            .any(|row| row.id != id && row.password_hash == password_hash)
        {
            return Err(StorageError::Constraint(format!(
                "duplicate verification hash {password_hash:?}"
            )));
        }
        if let Some(row) = inner.rows.get_mut(&id) {
            row.password_hash = password_hash.to_string();
        }
        Ok(1)
    }

    async fn reset_usage(&self, serial: u64, now: i64) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let Some(id) = inner
            .rows
            .values()
            .find(|row| row.product_serial_number == serial)
            .map(|row| row.id)
        else {
            return Ok(0);
        };
        if let Some(row) = inner.rows.get_mut(&id) {
            row.download = 0;
            row.upload = 0;
            row.last_refresh = now;
        }
        Ok(1)
    }

    async fn delete_by_serial(&self, serial: u64) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let ids: Vec<u64> = inner
            .rows
            .values()
            .filter(|row| row.product_serial_number == serial)
            .map(|row| row.id)
            .collect();
        for id in &ids {
            inner.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn delete_by_row(&self, id: u64) -> Result<u64, StorageError> {
        Ok(u64::from(self.lock().rows.remove(&id).is_some()))
    }

    async fn row_credential(&self, id: u64) -> Result<Option<RowCredential>, StorageError> {
        Ok(self.lock().rows.get(&id).map(|row| RowCredential {
            id: row.id,
            username: row.username.clone(),
            password_hash: row.password_hash.clone(),
        }))
    }

    async fn row_usage(&self, id: u64) -> Result<Option<RowUsage>, StorageError> {
        Ok(self.lock().rows.get(&id).map(|row| RowUsage {
            id: row.id,
            quota: row.quota,
            download: row.download,
            upload: row.upload,
        }))
    }
}
