//! Storage layer for subscriber accounts.
//!
//! The engine drives the [`AccountStore`] trait; [`MySqlStore`] is the
//! production implementation over a single wide `accounts` table.

mod models;
mod mysql;
mod store;

pub use models::{AccountPatch, AccountRow, NewAccount, RowCredential, RowUsage};
pub use mysql::MySqlStore;
pub use store::AccountStore;
