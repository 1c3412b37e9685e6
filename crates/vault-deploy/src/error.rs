//! Deployment error types.

use thiserror::Error;
use vault_core::{ConfigError, Kind};
use vault_chain::ChainError;
use vault_state::StateError;

/// Errors that stop a deployment.
///
/// Transient chain failures inside a retried step never surface here; a
/// `Chain` error comes from a call that is not retried (factory lookup,
/// view calls).
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("live state error: {0}")]
    State(#[from] StateError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("library `{library}` depends on `{dependency}`, which has no live record")]
    UnresolvedDependency { library: String, dependency: String },

    #[error("unit `{unit}` references `{reference}`, which has no live record")]
    UnresolvedReference { unit: String, reference: String },

    #[error("{0} is already deployed (pass --force to redeploy)")]
    AlreadyDeployed(String),

    #[error("descriptor has no {kind} unit named `{name}`")]
    UnitNotFound { kind: Kind, name: String },

    #[error("cancelled during `{step}`")]
    Cancelled { step: String },

    #[error("smoke run failed: {0}")]
    Smoke(String),
}

pub type DeployResult<T> = Result<T, DeployError>;
