//! `provost` Account Provisioning Engine
//!
//! Manages subscriber accounts for a proxy-protocol service backed by a
//! relational store. Each account binds a protocol credential (verification
//! hash plus recoverable encrypted form, kept in lockstep) to a
//! data-transfer quota and usage counters.
//!
//! The engine is driven by an external orchestrator; it does not speak the
//! proxy protocol, open server sockets, or own a CLI. Components:
//!
//! - [`validate`] - batch and single-account configuration validation
//! - [`accounting`] - quota conversion and usage derivation
//! - [`probe`] - runtime detection of driver-generated insert identifiers
//! - [`storage`] - the [`storage::AccountStore`] seam and its MySQL implementation
//! - [`engine`] - the lifecycle orchestrator
//! - [`registry`] - protocol-name registration for embedding hosts

pub mod accounting;
pub mod engine;
pub mod error;
pub mod probe;
pub mod registry;
pub mod storage;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;


pub use engine::{AccountStatus, AccountView, ProvisioningEngine};
pub use error::{BatchError, ProvisionError};
pub use probe::{InsertCapabilityProbe, InsertIdSupport};
pub use registry::{
    BackendFactory, BackendRegistry, ProvisioningBackend, TROJAN_PROTOCOL, register_defaults,
};
pub use storage::{AccountStore, MySqlStore};
