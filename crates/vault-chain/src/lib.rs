//! vault-chain: the boundaries vaultgrid talks through.
//!
//! The orchestrator never speaks to a node, an explorer, or a multisig
//! backend directly. It goes through three object-safe traits:
//!
//! - [`ChainClient`]: contract factories, deploys, proxy upgrades,
//!   impersonation, contract calls
//! - [`Verifier`]: block-explorer source verification
//! - [`ProposalService`]: off-chain multisig upgrade proposals
//!
//! [`SimulatedChain`], [`SimulatedExplorer`] and [`FileProposalService`]
//! implement them without any external service; the test suite and the
//! `vault` binary's rehearsal runs both use them.
//!
//! [`VerificationQueue`] is the best-effort verification side channel:
//! requests run as background tasks and their failures are only logged.

pub mod client;
pub mod error;
pub mod proposal;
pub mod sim;
pub mod verify;

pub use client::{ChainClient, ContractCall, ContractFactory, Signer, TxReceipt};
pub use error::{ChainError, ChainResult};
pub use proposal::{FileProposalService, Proposal, ProposalMetadata, ProposalRequest, ProposalService};
pub use sim::{SimOp, SimTx, SimulatedChain, SimulatedExplorer, RESTORED_CONTRACT};
pub use verify::{VerificationQueue, VerificationSummary, Verifier, VerifyOutcome, VerifyRequest};
