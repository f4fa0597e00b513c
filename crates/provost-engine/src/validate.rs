//! Account-configuration validation and normalization.
//!
//! Two input shapes arrive at the engine boundary. Single-account
//! operations carry an opaque payload with `password`/`quota` keys; batch
//! operations carry a list of loosely-typed string maps. Both are collapsed
//! into typed records here, before any storage work happens, so a rejected
//! configuration can never leave a partial write behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use provost_core::ConfigPayload;

use crate::error::ProvisionError;

/// Minimum password length. Longer passwords are less vulnerable to brute
/// force; the hash is unsalted by protocol contract, so this floor matters.
pub const MIN_PASSWORD_LEN: usize = 8;

const RECOGNIZED_KEYS: [&str; 5] = ["username", "password", "quota", "download", "upload"];

/// Which batch contract to validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Create,
    Update,
}

/// One normalized account record within a batch request.
///
/// `None` means "not mutated" for updates; for creates the validator
/// guarantees `username`, `password`, and `quota` are set.
#[derive(Debug, Clone, Default)]
pub struct BatchConfigRecord {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Allowance in bytes; negative means unlimited.
    pub quota: Option<i64>,
    pub download: Option<u64>,
    pub upload: Option<u64>,
}

/// Validate and normalize a batch of loosely-typed account configurations.
///
/// Fail-fast: the first offending record fails the whole batch, and no
/// partially-populated output is ever returned.
pub fn validate_batch(
    configs: &[HashMap<String, String>],
    op: BatchOp,
) -> Result<Vec<BatchConfigRecord>, ProvisionError> {
    match op {
        BatchOp::Create => validate_create_batch(configs),
        BatchOp::Update => validate_update_batch(configs),
    }
}

fn validate_create_batch(
    configs: &[HashMap<String, String>],
) -> Result<Vec<BatchConfigRecord>, ProvisionError> {
    let mut records = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        // Unknown keys are ignored on create; the three below are mandatory.
        let username = required(config, "username", index)?;
        let password = required(config, "password", index)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProvisionError::WeakPassword);
        }
        let quota = parse_signed(required(config, "quota", index)?, "quota", index)?;
        records.push(BatchConfigRecord {
            username: Some(username.clone()),
            password: Some(password.clone()),
            quota: Some(quota),
            ..BatchConfigRecord::default()
        });
    }
    Ok(records)
}

fn validate_update_batch(
    configs: &[HashMap<String, String>],
) -> Result<Vec<BatchConfigRecord>, ProvisionError> {
    let first = configs.first().ok_or_else(|| {
        ProvisionError::Configuration("update batch must contain at least one record".into())
    })?;

    // The first record's key set is the contract for the whole batch.
    let mut contract: Vec<&str> = Vec::with_capacity(first.len());
    for key in first.keys() {
        let Some(recognized) = RECOGNIZED_KEYS.iter().copied().find(|k| *k == key.as_str())
        else {
            return Err(ProvisionError::Configuration(format!(
                "unrecognized key {key:?} in update batch"
            )));
        };
        contract.push(recognized);
    }
    if contract.is_empty() {
        return Err(ProvisionError::Configuration(
            "update batch sets no recognized keys".into(),
        ));
    }

    let mut records = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        // Every record must carry exactly the contract keys; a superset or
        // a partial record would silently change meaning mid-batch.
        if config.len() != contract.len() {
            return Err(ProvisionError::Configuration(format!(
                "record {index}: key set does not match the first record"
            )));
        }
        let mut record = BatchConfigRecord::default();
        for &key in &contract {
            let value = config.get(key).ok_or_else(|| {
                ProvisionError::Configuration(format!(
                    "record {index}: key set does not match the first record"
                ))
            })?;
            match key {
                "username" => record.username = Some(value.clone()),
                "password" => {
                    if value.len() < MIN_PASSWORD_LEN {
                        return Err(ProvisionError::WeakPassword);
                    }
                    record.password = Some(value.clone());
                }
                "quota" => record.quota = Some(parse_signed(value, "quota", index)?),
                "download" => record.download = Some(parse_unsigned(value, "download", index)?),
                "upload" => record.upload = Some(parse_unsigned(value, "upload", index)?),
                _ => unreachable!("contract keys are drawn from RECOGNIZED_KEYS"),
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn required<'a>(
    config: &'a HashMap<String, String>,
    key: &str,
    index: usize,
) -> Result<&'a String, ProvisionError> {
    config.get(key).ok_or_else(|| {
        ProvisionError::Configuration(format!("record {index}: missing required key {key:?}"))
    })
}

fn parse_signed(value: &str, key: &str, index: usize) -> Result<i64, ProvisionError> {
    value.parse().map_err(|_| {
        ProvisionError::Configuration(format!(
            "record {index}: {key} is not a base-10 integer: {value:?}"
        ))
    })
}

fn parse_unsigned(value: &str, key: &str, index: usize) -> Result<u64, ProvisionError> {
    value.parse().map_err(|_| {
        ProvisionError::Configuration(format!(
            "record {index}: {key} is not a base-10 unsigned integer: {value:?}"
        ))
    })
}

/// Single-account creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfig {
    pub password: String,
    /// Data-transfer allowance in GB; 0 disables tracking, negative means
    /// unlimited.
    #[serde(default)]
    pub quota: f64,
}

impl CreateConfig {
    pub fn from_payload(payload: ConfigPayload<Self>) -> Result<Self, ProvisionError> {
        let config = payload.resolve()?;
        if config.password.len() < MIN_PASSWORD_LEN {
            return Err(ProvisionError::WeakPassword);
        }
        Ok(config)
    }
}

/// Single-account update payload. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub quota: Option<f64>,
}

impl UpdateConfig {
    pub fn from_payload(payload: ConfigPayload<Self>) -> Result<Self, ProvisionError> {
        let config = payload.resolve()?;
        if let Some(password) = &config.password {
            if password.len() < MIN_PASSWORD_LEN {
                return Err(ProvisionError::WeakPassword);
            }
        }
        if config.password.is_none() && config.quota.is_none() {
            return Err(ProvisionError::Configuration(
                "update sets no recognized fields".into(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn create_batch_normalizes() {
        let configs = vec![
            record(&[("username", "ada"), ("password", "abcdefgh"), ("quota", "1024")]),
            record(&[
                ("username", "grace"),
                ("password", "hopper-passwd"),
                ("quota", "-1"),
                ("comment", "ignored on create"),
            ]),
        ];
        let records = validate_batch(&configs, BatchOp::Create).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quota, Some(1024));
        assert_eq!(records[1].quota, Some(-1));
        assert_eq!(records[1].username.as_deref(), Some("grace"));
        assert!(records[0].download.is_none());
    }

    #[test]
    fn create_batch_missing_field_fails() {
        let configs = vec![record(&[("username", "ada"), ("password", "abcdefgh")])];
        let err = validate_batch(&configs, BatchOp::Create).unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn create_batch_weak_password_fails() {
        let configs = vec![record(&[
            ("username", "ada"),
            ("password", "short"),
            ("quota", "0"),
        ])];
        let err = validate_batch(&configs, BatchOp::Create).unwrap_err();
        assert!(matches!(err, ProvisionError::WeakPassword));
    }

    #[test]
    fn create_batch_bad_quota_fails() {
        let configs = vec![record(&[
            ("username", "ada"),
            ("password", "abcdefgh"),
            ("quota", "ten"),
        ])];
        assert!(validate_batch(&configs, BatchOp::Create).is_err());
        // platform overflow behavior: out-of-range integers fail the parse
        let configs = vec![record(&[
            ("username", "ada"),
            ("password", "abcdefgh"),
            ("quota", "9223372036854775808"),
        ])];
        assert!(validate_batch(&configs, BatchOp::Create).is_err());
    }

    #[test]
    fn update_batch_contract_from_first_record() {
        let configs = vec![
            record(&[("username", "ada"), ("quota", "2048")]),
            record(&[("username", "grace"), ("quota", "4096")]),
        ];
        let records = validate_batch(&configs, BatchOp::Update).unwrap();
        assert_eq!(records[1].quota, Some(4096));
        assert!(records[1].password.is_none());
    }

    #[test]
    fn update_batch_mismatched_key_set_fails() {
        // second record drops a contract key: the whole batch is rejected
        let configs = vec![
            record(&[("username", "ada"), ("quota", "2048")]),
            record(&[("username", "grace")]),
        ];
        let err = validate_batch(&configs, BatchOp::Update).unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn update_batch_superset_fails() {
        let configs = vec![
            record(&[("quota", "2048")]),
            record(&[("quota", "4096"), ("download", "1")]),
        ];
        assert!(validate_batch(&configs, BatchOp::Update).is_err());
    }

    #[test]
    fn update_batch_unrecognized_key_fails() {
        let configs = vec![record(&[("quota", "2048"), ("color", "red")])];
        assert!(validate_batch(&configs, BatchOp::Update).is_err());
    }

    #[test]
    fn update_batch_empty_record_fails() {
        let configs = vec![record(&[])];
        assert!(validate_batch(&configs, BatchOp::Update).is_err());
        assert!(validate_batch(&[], BatchOp::Update).is_err());
    }

    #[test]
    fn update_batch_counters_parse_unsigned() {
        let configs = vec![record(&[("download", "123"), ("upload", "456")])];
        let records = validate_batch(&configs, BatchOp::Update).unwrap();
        assert_eq!(records[0].download, Some(123));
        assert_eq!(records[0].upload, Some(456));

        let configs = vec![record(&[("download", "-1"), ("upload", "0")])];
        assert!(validate_batch(&configs, BatchOp::Update).is_err());
    }

    #[test]
    fn create_config_parses_and_enforces_policy() {
        let config = CreateConfig::from_payload(ConfigPayload::Text(
            r#"{"password":"abcdefgh","quota":5}"#.into(),
        ))
        .unwrap();
        assert_eq!(config.password, "abcdefgh");
        assert!((config.quota - 5.0).abs() < f64::EPSILON);

        // quota defaults to 0; unknown keys are ignored
        let config = CreateConfig::from_payload(ConfigPayload::Text(
            r#"{"password":"abcdefgh","nickname":"x"}"#.into(),
        ))
        .unwrap();
        assert!(config.quota.abs() < f64::EPSILON);

        assert!(matches!(
            CreateConfig::from_payload(ConfigPayload::Text(r#"{"password":"short"}"#.into())),
            Err(ProvisionError::WeakPassword)
        ));
        assert!(CreateConfig::from_payload(ConfigPayload::Text("{}".into())).is_err());
    }

    #[test]
    fn update_config_requires_some_field() {
        assert!(matches!(
            UpdateConfig::from_payload(ConfigPayload::Text("{}".into())),
            Err(ProvisionError::Configuration(_))
        ));
        let config =
            UpdateConfig::from_payload(ConfigPayload::Text(r#"{"quota":-1}"#.into())).unwrap();
        assert!(config.password.is_none());
        assert_eq!(config.quota, Some(-1.0));
    }
}
