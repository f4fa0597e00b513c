//! The account provisioning engine.
//!
//! Stateless request-response orchestration over the storage seam: each
//! public operation validates its input, does exactly one logical unit of
//! storage work, and returns. The only process-wide mutable state is the
//! insert-capability probe; the advertised server parameters sit behind a
//! reader/writer lock for hot reload.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{info, instrument, warn};

use provost_core::{ConfigPayload, EngineConfig, ServerInfo, StorageError, unix_timestamp};
use provost_crypto::{CredentialVault, random_mask};

use crate::accounting;
use crate::error::{BatchError, ProvisionError};
use crate::probe::{InsertCapabilityProbe, InsertIdSupport};
use crate::storage::{
    AccountPatch, AccountRow, AccountStore, MySqlStore, NewAccount, RowCredential, RowUsage,
};
use crate::validate::{self, BatchConfigRecord, BatchOp, CreateConfig, UpdateConfig};

/// Derived account status.
///
/// There is no stored status flag: an account is suspended exactly when its
/// verification hash no longer matches the hash of its recoverable
/// password's plaintext (see [`CredentialVault`] masking).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// A fully populated account, as returned by [`ProvisioningEngine::get_account`].
#[derive(Debug, Clone)]
pub struct AccountView {
    pub product_serial_number: u64,
    /// Decrypted plaintext password.
    pub password: String,
    pub verification_hash: String,
    pub status: AccountStatus,
    /// Allowance in bytes; 0 = no tracking, negative = unlimited.
    pub quota_bytes: i64,
    /// Download + upload since the last refresh.
    pub bytes_used: u64,
    /// Allowance in GB; -1 when unlimited or untracked.
    pub quota_gigabytes: f64,
    /// Remaining allowance in GB; -1 when not meaningful, negative when
    /// over quota.
    pub free_gigabytes: f64,
    /// Whole service hours since the last refresh (partial hours round up).
    pub service_hours_used: f64,
    pub last_refresh: i64,
    pub server_address: String,
    pub server_port: u16,
}

impl AccountView {
    /// Connection URL handed to the subscriber.
    pub fn share_url(&self) -> String {
        format!(
            "trojan://{}@{}:{}",
            self.password, self.server_address, self.server_port
        )
    }
}

/// The provisioning engine, generic over its storage seam.
pub struct ProvisioningEngine<S> {
    instance_id: String,
    info: RwLock<ServerInfo>,
    vault: CredentialVault,
    probe: InsertCapabilityProbe,
    store: S,
}

impl ProvisioningEngine<MySqlStore> {
    /// Open a MySQL-backed engine from a host-supplied configuration payload.
    pub async fn connect(
        instance_id: impl Into<String>,
        payload: ConfigPayload<EngineConfig>,
    ) -> Result<Self, ProvisionError> {
        let config = payload.resolve()?;
        config.validate()?;
        let vault = CredentialVault::from_hex_key(&config.credential_key)?;
        let store = MySqlStore::connect(&config.mysql)
            .await
            .map_err(ProvisionError::storage)?;
        Ok(Self::with_store(instance_id, config.server_info, vault, store))
    }
}

impl<S: AccountStore> ProvisioningEngine<S> {
    /// Assemble an engine from parts. This is the seam the test suite uses
    /// with an in-memory store.
    pub fn with_store(
        instance_id: impl Into<String>,
        info: ServerInfo,
        vault: CredentialVault,
        store: S,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            info: RwLock::new(info),
            vault,
            probe: InsertCapabilityProbe::new(),
            store,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The converged insert-capability verdict for this instance.
    pub fn insert_support(&self) -> InsertIdSupport {
        self.probe.current()
    }

    /// Replace the advertised server parameters (hot reload).
    pub fn update_info(&self, info: ServerInfo) {
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = info;
    }

    fn server_info(&self) -> ServerInfo {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ===== Single-account lifecycle, keyed by product serial number =====

    /// Provision one account. Validation failures never touch storage; a
    /// verification-hash collision surfaces as a storage failure rather
    /// than overwriting the existing account.
    #[instrument(skip(self, config), fields(instance = %self.instance_id))]
    pub async fn create_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<CreateConfig>,
    ) -> Result<(), ProvisionError> {
        let config = CreateConfig::from_payload(config)?;
        let pair = self.vault.derive_pair(&config.password)?;
        self.store
            .insert_account(NewAccount {
                username: "",
                password_hash: &pair.verification_hash,
                password_encrypted: &pair.recoverable,
                quota: accounting::quota_bytes(config.quota),
                product_serial_number,
                last_refresh: unix_timestamp(),
            })
            .await
            .map_err(ProvisionError::storage)?;
        info!(product_serial_number, "account created");
        Ok(())
    }

    /// Read one account, decrypting its password and filling in resource
    /// accounting and derived status.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn get_account(
        &self,
        product_serial_number: u64,
    ) -> Result<AccountView, ProvisionError> {
        let row = self.fetch_existing(product_serial_number).await?;
        let password = self.vault.decrypt(&row.password_encrypted)?;
        let status = if self.vault.verify(&password, &row.password_hash) {
            AccountStatus::Active
        } else {
            AccountStatus::Suspended
        };
        let bytes_used = row.download.saturating_add(row.upload);
        let info = self.server_info();
        Ok(AccountView {
            product_serial_number: row.product_serial_number,
            password,
            verification_hash: row.password_hash,
            status,
            quota_bytes: row.quota,
            bytes_used,
            quota_gigabytes: accounting::allocated_gigabytes(row.quota),
            free_gigabytes: accounting::free_gigabytes(row.quota, bytes_used),
            service_hours_used: accounting::service_hours_used(row.last_refresh, unix_timestamp()),
            last_refresh: row.last_refresh,
            server_address: info.server_address,
            server_port: info.server_port,
        })
    }

    /// Partial update: only the fields present in the payload are touched.
    #[instrument(skip(self, config), fields(instance = %self.instance_id))]
    pub async fn update_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<UpdateConfig>,
    ) -> Result<(), ProvisionError> {
        let config = UpdateConfig::from_payload(config)?;
        // MySQL reports zero affected rows for value-preserving updates, so
        // existence is checked explicitly instead.
        self.fetch_existing(product_serial_number).await?;
        let mut patch = AccountPatch::default();
        if let Some(password) = &config.password {
            patch.credentials = Some(self.vault.derive_pair(password)?);
        }
        if let Some(quota) = config.quota {
            patch.quota = Some(accounting::quota_bytes(quota));
        }
        self.store
            .update_by_serial(product_serial_number, &patch)
            .await
            .map_err(ProvisionError::storage)?;
        info!(product_serial_number, "account updated");
        Ok(())
    }

    /// Hard delete. Not idempotent: deleting an absent account fails.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn delete_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        let removed = self
            .store
            .delete_by_serial(product_serial_number)
            .await
            .map_err(ProvisionError::storage)?;
        if removed == 0 {
            return Err(ProvisionError::NotFound(product_serial_number));
        }
        info!(product_serial_number, "account deleted");
        Ok(())
    }

    /// Suspend by masking: the verification hash is overwritten with random
    /// data of the same shape, so protocol lookups can no longer reach the
    /// account. The recoverable password is untouched.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn suspend_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        let affected = self
            .store
            .set_password_hash(product_serial_number, &random_mask())
            .await
            .map_err(ProvisionError::storage)?;
        if affected == 0 {
            return Err(ProvisionError::NotFound(product_serial_number));
        }
        info!(product_serial_number, "account suspended");
        Ok(())
    }

    /// Undo a suspension by recomputing the verification hash from the
    /// recoverable password. Harmless on an account that was never
    /// suspended: it recomputes the same hash.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn unsuspend_account(
        &self,
        product_serial_number: u64,
    ) -> Result<(), ProvisionError> {
        let encrypted = self
            .store
            .fetch_encrypted_password(product_serial_number)
            .await
            .map_err(ProvisionError::storage)?
            .ok_or(ProvisionError::NotFound(product_serial_number))?;
        let plaintext = self.vault.decrypt(&encrypted)?;
        let hash = self.vault.hash(&plaintext);
        // Affected-row count is meaningless here: restoring an already
        // active account writes the value already stored.
        self.store
            .set_password_hash(product_serial_number, &hash)
            .await
            .map_err(ProvisionError::storage)?;
        info!(product_serial_number, "account unsuspended");
        Ok(())
    }

    /// Billing-cycle boundary: zero the usage counters and stamp a new
    /// last-refresh time.
    #[instrument(skip(self), fields(instance = %self.instance_id))]
    pub async fn refresh_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        self.fetch_existing(product_serial_number).await?;
        self.store
            .reset_usage(product_serial_number, unix_timestamp())
            .await
            .map_err(ProvisionError::storage)?;
        info!(product_serial_number, "account usage refreshed");
        Ok(())
    }

    /// Derived status: suspended exactly when no real plaintext hashes to
    /// the stored verification hash.
    pub async fn account_status(
        &self,
        product_serial_number: u64,
    ) -> Result<AccountStatus, ProvisionError> {
        let row = self.fetch_existing(product_serial_number).await?;
        let plaintext = self.vault.decrypt(&row.password_encrypted)?;
        Ok(if self.vault.verify(&plaintext, &row.password_hash) {
            AccountStatus::Active
        } else {
            AccountStatus::Suspended
        })
    }

    async fn fetch_existing(&self, serial: u64) -> Result<AccountRow, ProvisionError> {
        self.store
            .fetch_by_serial(serial)
            .await
            .map_err(ProvisionError::storage)?
            .ok_or(ProvisionError::NotFound(serial))
    }

    // ===== Batch operations, keyed by row identifier =====

    /// Create a batch of accounts. The returned row identifiers are
    /// positionally aligned with the input; on failure the committed prefix
    /// is preserved and reported.
    #[instrument(skip(self, configs), fields(instance = %self.instance_id, batch = configs.len()))]
    pub async fn create_accounts(
        &self,
        configs: &[HashMap<String, String>],
    ) -> Result<Vec<u64>, BatchError> {
        let records = validate::validate_batch(configs, BatchOp::Create)
            .map_err(|e| BatchError::new(Vec::new(), e))?;
        let mut committed = Vec::with_capacity(records.len());
        for record in &records {
            match self.insert_batch_record(record).await {
                Ok(id) => committed.push(id),
                Err(e) => return Err(BatchError::new(committed, e)),
            }
        }
        Ok(committed)
    }

    async fn insert_batch_record(
        &self,
        record: &BatchConfigRecord,
    ) -> Result<u64, ProvisionError> {
        // The create validator guarantees these three are present.
        let username = record.username.as_deref().unwrap_or_default();
        let password = record.password.as_deref().unwrap_or_default();
        let quota = record.quota.unwrap_or_default();

        let pair = self.vault.derive_pair(password)?;
        let reported = self
            .store
            .insert_account(NewAccount {
                username,
                password_hash: &pair.verification_hash,
                password_encrypted: &pair.recoverable,
                quota,
                product_serial_number: 0,
                last_refresh: unix_timestamp(),
            })
            .await
            .map_err(ProvisionError::storage)?;
        self.resolve_inserted_id(reported, username, &pair.verification_hash)
            .await
    }

    /// Turn the driver-reported value of a just-executed insert into a row
    /// identifier, consulting the capability probe.
    async fn resolve_inserted_id(
        &self,
        reported: u64,
        username: &str,
        password_hash: &str,
    ) -> Result<u64, ProvisionError> {
        match self.probe.current() {
            InsertIdSupport::Supported => {
                if reported == 0 {
                    // The fast path is known-good on this connection; a zero
                    // here is a genuine failure, not a capability change.
                    return Err(ProvisionError::storage(StorageError::Insert(
                        "driver reported no generated identifier".into(),
                    )));
                }
                Ok(reported)
            }
            InsertIdSupport::Unsupported => self.lookup_inserted_id(username, password_hash).await,
            InsertIdSupport::Unknown => {
                if reported == 0 {
                    if self.probe.converge(InsertIdSupport::Unsupported)
                        == InsertIdSupport::Unsupported
                    {
                        warn!(
                            instance = %self.instance_id,
                            "storage driver does not report generated insert identifiers; falling back to natural-key lookups"
                        );
                    }
                    // Whatever the probe converged to, this row's id is only
                    // reachable through the lookup.
                    self.lookup_inserted_id(username, password_hash).await
                } else {
                    self.probe.converge(InsertIdSupport::Supported);
                    Ok(reported)
                }
            }
        }
    }

    async fn lookup_inserted_id(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<u64, ProvisionError> {
        self.store
            .find_row_id(username, password_hash)
            .await
            .map_err(ProvisionError::storage)?
            .ok_or_else(|| {
                ProvisionError::storage(StorageError::Insert(
                    "inserted row not found by natural key".into(),
                ))
            })
    }

    /// Update a batch of accounts by row identifier. `ids` and `configs`
    /// are positionally aligned; the first record's key set defines what
    /// every record must supply.
    #[instrument(skip(self, ids, configs), fields(instance = %self.instance_id, batch = ids.len()))]
    pub async fn update_accounts(
        &self,
        ids: &[u64],
        configs: &[HashMap<String, String>],
    ) -> Result<Vec<u64>, BatchError> {
        if ids.len() != configs.len() {
            return Err(BatchError::new(
                Vec::new(),
                ProvisionError::Configuration(
                    "identifier and configuration counts differ".into(),
                ),
            ));
        }
        let records = validate::validate_batch(configs, BatchOp::Update)
            .map_err(|e| BatchError::new(Vec::new(), e))?;
        let mut committed = Vec::with_capacity(ids.len());
        for (&id, record) in ids.iter().zip(&records) {
            match self.update_batch_record(id, record).await {
                Ok(()) => committed.push(id),
                Err(e) => return Err(BatchError::new(committed, e)),
            }
        }
        Ok(committed)
    }

    async fn update_batch_record(
        &self,
        id: u64,
        record: &BatchConfigRecord,
    ) -> Result<(), ProvisionError> {
        let mut patch = AccountPatch {
            username: record.username.clone(),
            credentials: None,
            quota: record.quota,
            download: record.download,
            upload: record.upload,
        };
        if let Some(password) = &record.password {
            patch.credentials = Some(self.vault.derive_pair(password)?);
        }
        // Explicit existence check; the update itself may legitimately
        // affect zero rows.
        if self
            .store
            .row_usage(id)
            .await
            .map_err(ProvisionError::storage)?
            .is_none()
        {
            return Err(ProvisionError::NotFound(id));
        }
        self.store
            .update_by_row(id, &patch)
            .await
            .map_err(ProvisionError::storage)?;
        Ok(())
    }

    /// Delete a batch of accounts by row identifier, fail-fast.
    #[instrument(skip(self, ids), fields(instance = %self.instance_id, batch = ids.len()))]
    pub async fn delete_accounts(&self, ids: &[u64]) -> Result<Vec<u64>, BatchError> {
        let mut committed = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.store.delete_by_row(id).await {
                Ok(0) => {
                    return Err(BatchError::new(committed, ProvisionError::NotFound(id)));
                }
                Ok(_) => committed.push(id),
                Err(e) => {
                    return Err(BatchError::new(committed, ProvisionError::storage(e)));
                }
            }
        }
        Ok(committed)
    }

    /// Admin credential export for a set of rows.
    pub async fn account_credentials(
        &self,
        ids: &[u64],
    ) -> Result<Vec<RowCredential>, ProvisionError> {
        let mut credentials = Vec::with_capacity(ids.len());
        for &id in ids {
            credentials.push(
                self.store
                    .row_credential(id)
                    .await
                    .map_err(ProvisionError::storage)?
                    .ok_or(ProvisionError::NotFound(id))?,
            );
        }
        Ok(credentials)
    }

    /// Traffic usage for a set of rows.
    pub async fn account_usage(&self, ids: &[u64]) -> Result<Vec<RowUsage>, ProvisionError> {
        let mut usage = Vec::with_capacity(ids.len());
        for &id in ids {
            usage.push(
                self.store
                    .row_usage(id)
                    .await
                    .map_err(ProvisionError::storage)?
                    .ok_or(ProvisionError::NotFound(id))?,
            );
        }
        Ok(usage)
    }
}
