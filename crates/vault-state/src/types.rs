//! Persisted record of a deployed component.

use serde::{Deserialize, Serialize};
use vault_core::Address;

/// The durable result of a successful deployment.
///
/// Exactly one record exists per key; a redeploy overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRecord {
    pub name: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisig: Option<Address>,
}

impl LiveRecord {
    pub fn new(name: &str, address: Address) -> Self {
        Self {
            name: name.to_string(),
            address,
            owner: None,
            multisig: None,
        }
    }

    /// Account allowed to authorise upgrades: the multisig if recorded,
    /// otherwise the single owner.
    pub fn upgrade_authority(&self) -> Option<Address> {
        self.multisig.or(self.owner)
    }
}
