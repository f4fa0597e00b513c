//! Host-facing backend registration.
//!
//! The embedding host discovers provisioning backends by protocol name and
//! instantiates them with an opaque configuration payload. The engine
//! registers itself under [`TROJAN_PROTOCOL`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use provost_core::{ConfigPayload, EngineConfig};

use crate::engine::{AccountStatus, AccountView, ProvisioningEngine};
use crate::error::ProvisionError;
use crate::storage::{AccountStore, MySqlStore};
use crate::validate::{CreateConfig, UpdateConfig};

/// Protocol name the engine registers under.
pub const TROJAN_PROTOCOL: &str = "trojan";

/// The account lifecycle surface a host drives, independent of the backing
/// protocol implementation.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn create_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<CreateConfig>,
    ) -> Result<(), ProvisionError>;

    async fn get_account(&self, product_serial_number: u64)
    -> Result<AccountView, ProvisionError>;

    async fn update_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<UpdateConfig>,
    ) -> Result<(), ProvisionError>;

    async fn delete_account(&self, product_serial_number: u64) -> Result<(), ProvisionError>;

    async fn suspend_account(&self, product_serial_number: u64) -> Result<(), ProvisionError>;

    async fn unsuspend_account(&self, product_serial_number: u64) -> Result<(), ProvisionError>;

    async fn refresh_account(&self, product_serial_number: u64) -> Result<(), ProvisionError>;

    async fn account_status(
        &self,
        product_serial_number: u64,
    ) -> Result<AccountStatus, ProvisionError>;
}

#[async_trait]
impl<S: AccountStore> ProvisioningBackend for ProvisioningEngine<S> {
    async fn create_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<CreateConfig>,
    ) -> Result<(), ProvisionError> {
        Self::create_account(self, product_serial_number, config).await
    }

    async fn get_account(
        &self,
        product_serial_number: u64,
    ) -> Result<AccountView, ProvisionError> {
        Self::get_account(self, product_serial_number).await
    }

    async fn update_account(
        &self,
        product_serial_number: u64,
        config: ConfigPayload<UpdateConfig>,
    ) -> Result<(), ProvisionError> {
        Self::update_account(self, product_serial_number, config).await
    }

    async fn delete_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        Self::delete_account(self, product_serial_number).await
    }

    async fn suspend_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        Self::suspend_account(self, product_serial_number).await
    }

    async fn unsuspend_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        Self::unsuspend_account(self, product_serial_number).await
    }

    async fn refresh_account(&self, product_serial_number: u64) -> Result<(), ProvisionError> {
        Self::refresh_account(self, product_serial_number).await
    }

    async fn account_status(
        &self,
        product_serial_number: u64,
    ) -> Result<AccountStatus, ProvisionError> {
        Self::account_status(self, product_serial_number).await
    }
}

/// Builds a backend for one engine instance from its opaque configuration.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn open(
        &self,
        instance_id: &str,
        config: ConfigPayload<EngineConfig>,
    ) -> Result<Arc<dyn ProvisioningBackend>, ProvisionError>;
}

struct TrojanFactory;

#[async_trait]
impl BackendFactory for TrojanFactory {
    async fn open(
        &self,
        instance_id: &str,
        config: ConfigPayload<EngineConfig>,
    ) -> Result<Arc<dyn ProvisioningBackend>, ProvisionError> {
        let engine = ProvisioningEngine::<MySqlStore>::connect(instance_id, config).await?;
        Ok(Arc::new(engine))
    }
}

/// Registry mapping protocol names to backend factories.
#[derive(Default)]
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a protocol name. A later registration for
    /// the same name replaces the earlier one.
    pub fn register(&self, protocol: impl Into<String>, factory: Arc<dyn BackendFactory>) {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol.into(), factory);
    }

    pub fn contains(&self, protocol: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(protocol)
    }

    /// Instantiate a backend by protocol name.
    pub async fn open(
        &self,
        protocol: &str,
        instance_id: &str,
        config: ConfigPayload<EngineConfig>,
    ) -> Result<Arc<dyn ProvisioningBackend>, ProvisionError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .cloned()
            .ok_or_else(|| {
                ProvisionError::Configuration(format!(
                    "no provisioning backend registered for protocol {protocol:?}"
                ))
            })?;
        factory.open(instance_id, config).await
    }
}

/// Install the built-in backends.
pub fn register_defaults(registry: &BackendRegistry) {
    registry.register(TROJAN_PROTOCOL, Arc::new(TrojanFactory));
}
