//! Errors raised across the chain, explorer, and proposal boundaries.
//!
//! All of these are treated as transient by the orchestrator: a failing
//! state-mutating call is retried, a failing verification is logged.

use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("unknown contract artifact `{0}`")]
    UnknownContract(String),

    #[error("contract `{contract}` needs library `{library}` linked")]
    MissingLink { contract: String, library: String },

    #[error("signer error: {0}")]
    Signer(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("proposal error: {0}")]
    Proposal(String),
}
