//! Configuration payloads for the provisioning engine.
//!
//! The host instantiates an engine with an opaque configuration payload and
//! later passes per-account payloads through the same channel. A payload
//! arrives in one of three shapes: a decoded JSON object, a raw JSON string,
//! or an already-typed record. `ConfigPayload` models that switch; anything
//! else is rejected rather than coerced.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An opaque configuration payload as handed over by the host.
#[derive(Debug, Clone)]
pub enum ConfigPayload<T> {
    /// A decoded JSON object.
    Json(serde_json::Value),
    /// A JSON document as a string.
    Text(String),
    /// An already-typed record.
    Typed(T),
}

impl<T: DeserializeOwned> ConfigPayload<T> {
    /// Collapse the payload into its typed form.
    ///
    /// JSON values must be objects; scalars and arrays fail with a
    /// configuration error instead of a best-effort conversion.
    pub fn resolve(self) -> Result<T> {
        match self {
            Self::Json(value) => {
                if !value.is_object() {
                    return Err(Error::Config(
                        "configuration payload must be a JSON object".into(),
                    ));
                }
                Ok(serde_json::from_value(value)?)
            }
            Self::Text(raw) => Ok(serde_json::from_str(&raw)?),
            Self::Typed(typed) => Ok(typed),
        }
    }
}

/// Complete engine configuration: storage connection plus the service-level
/// parameters advertised to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub server_info: ServerInfo,
    /// Hex-encoded 32-byte key for the credential vault.
    pub credential_key: String,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.mysql.validate()
    }
}

/// MySQL/MariaDB connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    /// For IPv6, use the `[::]` form.
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,

    /// CA certificate enabling encrypted transport.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    /// Client certificate; requires `client_key_path` and `ca_cert_path`.
    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,
    /// Client private key; requires `client_cert_path` and `ca_cert_path`.
    #[serde(default)]
    pub client_key_path: Option<PathBuf>,
}

const fn default_mysql_port() -> u16 {
    3306
}

impl MysqlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.user.is_empty() || self.database.is_empty() {
            return Err(Error::Config(
                "mysql host, user, and database must be set".into(),
            ));
        }
        // A client certificate only makes sense as a pair, and only over an
        // encrypted transport anchored by a CA certificate.
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Config(
                    "client_cert_path and client_key_path must be set together".into(),
                ));
            }
            (Some(_), Some(_)) if self.ca_cert_path.is_none() => {
                return Err(Error::Config(
                    "client certificate requires ca_cert_path".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Service-level parameters advertised to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_address: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Monthly bandwidth of the serving node, in bytes.
    #[serde(default)]
    pub server_monthly_bandwidth: f64,
}

const fn default_server_port() -> u16 {
    443
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            server_port: default_server_port(),
            server_monthly_bandwidth: 0.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> EngineConfig {
        EngineConfig {
            mysql: MysqlConfig {
                host: "127.0.0.1".into(),
                port: 3306,
                user: "provost".into(),
                password: "secret".into(),
                database: "provost".into(),
                ca_cert_path: None,
                client_cert_path: None,
                client_key_path: None,
            },
            server_info: ServerInfo::default(),
            credential_key: "00".repeat(32),
        }
    }

    #[test]
    fn resolve_from_json_string() {
        let raw = r#"{
            "mysql": {
                "host": "db.internal",
                "user": "provost",
                "password": "secret",
                "database": "accounts"
            },
            "server_info": {
                "server_address": "proxy.example.com",
                "server_port": 8443
            },
            "credential_key": "aa"
        }"#;
        let config: EngineConfig = ConfigPayload::Text(raw.to_string()).resolve().unwrap();
        assert_eq!(config.mysql.host, "db.internal");
        assert_eq!(config.mysql.port, 3306); // default
        assert_eq!(config.server_info.server_port, 8443);
    }

    #[test]
    fn resolve_from_json_value() {
        let value = serde_json::json!({
            "mysql": {
                "host": "localhost",
                "user": "u",
                "password": "p",
                "database": "d"
            },
            "credential_key": "aa"
        });
        let config: EngineConfig = ConfigPayload::Json(value).resolve().unwrap();
        assert_eq!(config.server_info.server_port, 443);
        assert_eq!(config.server_info.server_address, "");
    }

    #[test]
    fn resolve_from_typed_record() {
        let config = ConfigPayload::Typed(sample_config()).resolve().unwrap();
        assert_eq!(config.mysql.database, "provost");
    }

    #[test]
    fn non_object_json_rejected() {
        let result: Result<EngineConfig> = ConfigPayload::Json(serde_json::json!(42)).resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn missing_field_rejected() {
        let result: Result<EngineConfig> = ConfigPayload::Text("{}".into()).resolve();
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn client_cert_without_key_rejected() {
        let mut config = sample_config();
        config.mysql.ca_cert_path = Some("/etc/provost/ca.pem".into());
        config.mysql.client_cert_path = Some("/etc/provost/client.pem".into());
        assert!(config.validate().is_err());

        config.mysql.client_key_path = Some("/etc/provost/client.key".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn client_cert_pair_requires_ca() {
        let mut config = sample_config();
        config.mysql.client_cert_path = Some("/etc/provost/client.pem".into());
        config.mysql.client_key_path = Some("/etc/provost/client.key".into());
        assert!(config.validate().is_err());
    }
}
