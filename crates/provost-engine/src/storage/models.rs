//! Data models for the account store.

use serde::Serialize;

use provost_crypto::CredentialPair;

/// One subscriber row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: u64,
    /// Batch-world half of the natural key; empty for accounts created
    /// through the serial-number path.
    pub username: String,
    /// Verification hash. The column keeps the protocol's `password` name.
    #[sqlx(rename = "password")]
    pub password_hash: String,
    /// Allowance in bytes; 0 = no tracking, negative = unlimited.
    pub quota: i64,
    pub download: u64,
    pub upload: u64,
    /// Stable external identifier; 0 for batch-created rows.
    pub product_serial_number: u64,
    pub password_encrypted: String,
    /// Unix seconds of the last usage reset.
    pub last_refresh: i64,
}

/// Parameters for inserting one account row.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub password_encrypted: &'a str,
    pub quota: i64,
    pub product_serial_number: u64,
    pub last_refresh: i64,
}

/// A partial update for one row. `None` leaves the column untouched.
///
/// The two credential columns only ever travel together; masking, the one
/// operation that touches the hash alone, has its own dedicated store call.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub credentials: Option<CredentialPair>,
    pub quota: Option<i64>,
    pub download: Option<u64>,
    pub upload: Option<u64>,
}

impl AccountPatch {
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.credentials.is_none()
            && self.quota.is_none()
            && self.download.is_none()
            && self.upload.is_none()
    }
}

/// Credential projection of a row, for admin export.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RowCredential {
    pub id: u64,
    pub username: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

/// Traffic usage projection of a row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RowUsage {
    pub id: u64,
    pub quota: i64,
    pub download: u64,
    pub upload: u64,
}
