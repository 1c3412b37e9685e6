//! vault-core: shared model for the vaultgrid orchestrator.
//!
//! Holds the value types every other crate speaks in (addresses, amounts,
//! ABI values, investable keys), the typed deploy/upgrade units, the
//! descriptor resolver that turns `$ref`-bearing JSON descriptors into those
//! units, and the `vault.toml` settings file.

pub mod abi;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod primitives;
pub mod reference;
pub mod types;
pub mod unit;

pub use abi::AbiValue;
pub use config::VaultConfig;
pub use error::{ConfigError, ConfigResult};
pub use primitives::{Address, Amount};
pub use reference::ContractRef;
pub use types::*;
pub use unit::*;
