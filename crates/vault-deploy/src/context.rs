//! Shared handles for one deployment run.

use std::future::Future;
use std::fmt::Display;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vault_chain::{ChainClient, VerificationQueue, Verifier};
use vault_core::{InvestableKey, Kind};
use vault_state::LiveStore;

use crate::error::DeployResult;
use crate::retry::{with_retry, RetryPolicy};

/// What to do when a component already has a live record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedeployPolicy {
    /// Investables fail with `AlreadyDeployed` before any transaction;
    /// libraries are reused.
    #[default]
    Reject,
    /// Deploy again and overwrite the live record.
    Force,
}

/// Network, chain, store and side channels a deployment runs against.
///
/// Cloning is cheap; every handle is shared.
#[derive(Clone)]
pub struct DeployContext {
    pub network: String,
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn LiveStore>,
    pub verification: Arc<VerificationQueue>,
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
    pub redeploy: RedeployPolicy,
}

impl DeployContext {
    pub fn new(
        network: &str,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn LiveStore>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            network: network.to_string(),
            chain,
            store,
            verification: Arc::new(VerificationQueue::new(verifier, network)),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            redeploy: RedeployPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_redeploy(mut self, redeploy: RedeployPolicy) -> Self {
        self.redeploy = redeploy;
        self
    }

    pub fn key(&self, kind: Kind, name: &str) -> DeployResult<InvestableKey> {
        Ok(InvestableKey::new(&self.network, kind, name)?)
    }

    /// [`with_retry`] using this run's policy and cancellation token.
    pub async fn retry<T, E, F, Fut>(&self, step: &str, op: F) -> DeployResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        with_retry(&self.retry, &self.cancel, step, op).await
    }
}
