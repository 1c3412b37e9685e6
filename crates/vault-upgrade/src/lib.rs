//! vault-upgrade: forward-only upgrades of deployed investable proxies.
//!
//! An upgrade either runs directly (fork or test networks, where the
//! custody account can be impersonated) or ends as an off-chain multisig
//! proposal (production). Both paths share the state machine in [`state`]:
//!
//! ```text
//! Pending ──fork──────▶ DirectlyUpgraded ──▶ Verified
//!    └─────production──▶ Proposed ──(external signer)──▶ Executed
//! ```
//!
//! # Components
//!
//! - **`state`**: upgrade state machine with checked transitions
//! - **`proposer`**: resolves the proxy and its authority, deploys the new
//!   implementation, then upgrades or proposes

pub mod error;
pub mod proposer;
pub mod state;

pub use error::{UpgradeError, UpgradeResult};
pub use proposer::{UpgradeMode, UpgradeProposer, UpgradeReport};
pub use state::{Upgrade, UpgradeState};
