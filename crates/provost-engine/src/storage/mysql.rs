//! MySQL-backed account store.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::QueryBuilder;
use tracing::info;

use provost_core::{MysqlConfig, StorageError};

use super::models::{AccountPatch, AccountRow, NewAccount, RowCredential, RowUsage};
use super::store::AccountStore;

/// One wide table; the verification hash doubles as the protocol lookup key,
/// hence the unique index on `password`.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS accounts (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
    username VARCHAR(64) NOT NULL DEFAULT '',
    password CHAR(56) NOT NULL,
    quota BIGINT NOT NULL DEFAULT 0,
    download BIGINT UNSIGNED NOT NULL DEFAULT 0,
    upload BIGINT UNSIGNED NOT NULL DEFAULT 0,
    product_serial_number BIGINT UNSIGNED NOT NULL DEFAULT 0,
    password_encrypted VARCHAR(255) NOT NULL,
    last_refresh BIGINT NOT NULL,
    PRIMARY KEY (id),
    UNIQUE KEY (password),
    INDEX (product_serial_number)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci";

/// MySQL/MariaDB implementation of [`AccountStore`].
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect and make sure the `accounts` table exists.
    pub async fn connect(config: &MysqlConfig) -> Result<Self, StorageError> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        if let Some(ca) = &config.ca_cert_path {
            options = options.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca);
            // Config validation guarantees the client cert arrives as a pair.
            if let (Some(cert), Some(key)) = (&config.client_cert_path, &config.client_key_path) {
                options = options.ssl_client_cert(cert).ssl_client_key(key);
            }
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(host = %config.host, database = %config.database, "Account database opened");

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn apply_patch(
        &self,
        key_column: &str,
        key: u64,
        patch: &AccountPatch,
    ) -> Result<u64, StorageError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<'_, MySql> = QueryBuilder::new("UPDATE accounts SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(username) = &patch.username {
                set.push("username = ");
                set.push_bind_unseparated(username.clone());
            }
            if let Some(pair) = &patch.credentials {
                set.push("password = ");
                set.push_bind_unseparated(pair.verification_hash.clone());
                set.push("password_encrypted = ");
                set.push_bind_unseparated(pair.recoverable.clone());
            }
            if let Some(quota) = patch.quota {
                set.push("quota = ");
                set.push_bind_unseparated(quota);
            }
            if let Some(download) = patch.download {
                set.push("download = ");
                set.push_bind_unseparated(download);
            }
            if let Some(upload) = patch.upload {
                set.push("upload = ");
                set.push_bind_unseparated(upload);
            }
        }
        builder.push(" WHERE ");
        builder.push(key_column);
        builder.push(" = ");
        builder.push_bind(key);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountStore for MySqlStore {
    async fn insert_account(&self, account: NewAccount<'_>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO accounts (username, password, quota, product_serial_number, password_encrypted, last_refresh) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account.username)
        .bind(account.password_hash)
        .bind(account.quota)
        .bind(account.product_serial_number)
        .bind(account.password_encrypted)
        .bind(account.last_refresh)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn find_row_id(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<u64>, StorageError> {
        let id = sqlx::query_scalar::<_, u64>(
            "SELECT id FROM accounts WHERE username = ? AND password = ?",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn fetch_by_serial(&self, serial: u64) -> Result<Option<AccountRow>, StorageError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE product_serial_number = ?",
        )
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn fetch_encrypted_password(
        &self,
        serial: u64,
    ) -> Result<Option<String>, StorageError> {
        let encrypted = sqlx::query_scalar::<_, String>(
            "SELECT password_encrypted FROM accounts WHERE product_serial_number = ?",
        )
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;

        Ok(encrypted)
    }

    async fn update_by_serial(
        &self,
        serial: u64,
        patch: &AccountPatch,
    ) -> Result<u64, StorageError> {
        self.apply_patch("product_serial_number", serial, patch).await
    }

    async fn update_by_row(&self, id: u64, patch: &AccountPatch) -> Result<u64, StorageError> {
        self.apply_patch("id", id, patch).await
    }

    async fn set_password_hash(
        &self,
        serial: u64,
        password_hash: &str,
    ) -> Result<u64, StorageError> {
        let result =
            sqlx::query("UPDATE accounts SET password = ? WHERE product_serial_number = ?")
                .bind(password_hash)
                .bind(serial)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn reset_usage(&self, serial: u64, now: i64) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE accounts SET download = 0, upload = 0, last_refresh = ? WHERE product_serial_number = ?",
        )
        .bind(now)
        .bind(serial)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_serial(&self, serial: u64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM accounts WHERE product_serial_number = ?")
            .bind(serial)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_row(&self, id: u64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn row_credential(&self, id: u64) -> Result<Option<RowCredential>, StorageError> {
        let credential = sqlx::query_as::<_, RowCredential>(
            "SELECT id, username, password FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn row_usage(&self, id: u64) -> Result<Option<RowUsage>, StorageError> {
        let usage = sqlx::query_as::<_, RowUsage>(
            "SELECT id, quota, download, upload FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(usage)
    }
}
