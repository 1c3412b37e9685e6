//! Upgrade error types.

use thiserror::Error;
use vault_chain::ChainError;
use vault_core::ConfigError;
use vault_deploy::DeployError;
use vault_state::StateError;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("live state error: {0}")]
    State(#[from] StateError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("proxy `{0}` has no live record")]
    ProxyNotFound(String),

    #[error("{proxy} has neither a multisig nor an owner to authorize the upgrade")]
    NoAuthorizedSigner { proxy: String },

    #[error("invalid upgrade transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

pub type UpgradeResult<T> = Result<T, UpgradeError>;
