//! Upgrade state machine.

use serde::{Deserialize, Serialize};
use tracing::info;
use vault_core::{Address, InvestableKey};

use crate::error::{UpgradeError, UpgradeResult};

/// Where an upgrade stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpgradeState {
    /// Nothing sent yet.
    Pending,
    /// Proxy points at the new implementation (fork/test networks).
    DirectlyUpgraded { implementation: Address },
    /// Directly upgraded and the implementation's source is verified.
    Verified { implementation: Address },
    /// Waiting on the custody account to execute a proposal.
    Proposed {
        url: String,
        proposal_id: String,
        implementation: Address,
    },
    /// The custody account executed the proposal.
    Executed { implementation: Address },
}

impl UpgradeState {
    pub fn name(&self) -> &'static str {
        match self {
            UpgradeState::Pending => "pending",
            UpgradeState::DirectlyUpgraded { .. } => "directly_upgraded",
            UpgradeState::Verified { .. } => "verified",
            UpgradeState::Proposed { .. } => "proposed",
            UpgradeState::Executed { .. } => "executed",
        }
    }

    pub fn implementation(&self) -> Option<Address> {
        match self {
            UpgradeState::Pending => None,
            UpgradeState::DirectlyUpgraded { implementation }
            | UpgradeState::Verified { implementation }
            | UpgradeState::Proposed { implementation, .. }
            | UpgradeState::Executed { implementation } => Some(*implementation),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UpgradeState::Verified { .. } | UpgradeState::Executed { .. })
    }
}

/// One proxy upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub key: InvestableKey,
    pub proxy: Address,
    pub contract_name: String,
    pub state: UpgradeState,
}

impl Upgrade {
    pub fn new(key: InvestableKey, proxy: Address, contract_name: &str) -> Self {
        Self {
            key,
            proxy,
            contract_name: contract_name.to_string(),
            state: UpgradeState::Pending,
        }
    }

    /// Pending → DirectlyUpgraded.
    pub fn mark_upgraded(&mut self, implementation: Address) -> UpgradeResult<()> {
        let next = UpgradeState::DirectlyUpgraded { implementation };
        match self.state {
            UpgradeState::Pending => self.transition(next),
            _ => Err(self.invalid(&next)),
        }
    }

    /// DirectlyUpgraded → Verified.
    pub fn mark_verified(&mut self) -> UpgradeResult<()> {
        match self.state {
            UpgradeState::DirectlyUpgraded { implementation } => {
                self.transition(UpgradeState::Verified { implementation })
            }
            _ => Err(self.invalid(&UpgradeState::Verified {
                implementation: Address::ZERO,
            })),
        }
    }

    /// Pending → Proposed.
    pub fn mark_proposed(&mut self, url: &str, proposal_id: &str, implementation: Address) -> UpgradeResult<()> {
        let next = UpgradeState::Proposed {
            url: url.to_string(),
            proposal_id: proposal_id.to_string(),
            implementation,
        };
        match self.state {
            UpgradeState::Pending => self.transition(next),
            _ => Err(self.invalid(&next)),
        }
    }

    /// Proposed → Executed, once the custody account has acted.
    pub fn mark_executed(&mut self) -> UpgradeResult<()> {
        match self.state {
            UpgradeState::Proposed { implementation, .. } => {
                self.transition(UpgradeState::Executed { implementation })
            }
            _ => Err(self.invalid(&UpgradeState::Executed {
                implementation: Address::ZERO,
            })),
        }
    }

    fn transition(&mut self, next: UpgradeState) -> UpgradeResult<()> {
        info!(
            proxy = %self.key,
            from = self.state.name(),
            to = next.name(),
            "upgrade state changed"
        );
        self.state = next;
        Ok(())
    }

    fn invalid(&self, next: &UpgradeState) -> UpgradeError {
        UpgradeError::InvalidTransition {
            from: self.state.name(),
            to: next.name(),
        }
    }
}
