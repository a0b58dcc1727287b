pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod log;
pub mod model;
pub mod policy;
pub mod prometheus;
pub mod store;
pub mod vault;
pub mod workflow;

pub use crate::config::VaultConfig;
pub use crate::error::Error;
pub use crate::identity::{IdentityProvider, StaticProvider};
pub use crate::log::init;
pub use crate::model::Role;
pub use crate::policy::{evaluate, AccessGrant, Action, Caller, Decision, DenyReason, Resource};
pub use crate::store::{EntityStore, MemoryStore};
pub use crate::vault::{Session, Vault};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub mod test_helpers;
