//! Block-explorer verification and the best-effort side channel around it.
//!
//! Verification never blocks a deployment. [`VerificationQueue::submit`]
//! spawns the request onto a [`JoinSet`]; [`VerificationQueue::drain`]
//! collects the outcomes at the end of a pipeline and only ever logs
//! failures.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vault_core::Address;

use crate::error::{ChainError, ChainResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub network: String,
    pub address: Address,
    /// Fully qualified contract name, when the explorer needs a hint.
    pub contract_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    /// The network has no explorer to verify against.
    Skipped,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> ChainResult<VerifyOutcome>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationSummary {
    pub verified: usize,
    pub already_verified: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl VerificationSummary {
    fn record(&mut self, result: &ChainResult<VerifyOutcome>) {
        match result {
            Ok(VerifyOutcome::Verified) => self.verified += 1,
            Ok(VerifyOutcome::AlreadyVerified) => self.already_verified += 1,
            Ok(VerifyOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct VerificationQueue {
    verifier: Arc<dyn Verifier>,
    network: String,
    tasks: Mutex<JoinSet<(Address, ChainResult<VerifyOutcome>)>>,
    inline: Mutex<VerificationSummary>,
}

impl VerificationQueue {
    pub fn new(verifier: Arc<dyn Verifier>, network: &str) -> Self {
        Self {
            verifier,
            network: network.to_string(),
            tasks: Mutex::new(JoinSet::new()),
            inline: Mutex::new(VerificationSummary::default()),
        }
    }

    fn request(&self, address: Address, contract_name: Option<&str>) -> VerifyRequest {
        VerifyRequest {
            network: self.network.clone(),
            address,
            contract_name: contract_name.map(str::to_string),
        }
    }

    /// Queue verification of `address` without waiting for it.
    pub async fn submit(&self, address: Address, contract_name: Option<&str>) {
        let request = self.request(address, contract_name);
        let verifier = Arc::clone(&self.verifier);
        debug!(network = %self.network, %address, "verification queued");
        self.tasks.lock().await.spawn(async move {
            let result = verifier.verify(&request).await;
            (request.address, result)
        });
    }

    /// Verify `address` inline. Failures are logged and reported as `false`.
    ///
    /// The outcome is counted in the summary the next [`drain`](Self::drain)
    /// returns.
    pub async fn verify_now(&self, address: Address, contract_name: Option<&str>) -> bool {
        let request = self.request(address, contract_name);
        let result = self.verifier.verify(&request).await;
        log_outcome(&self.network, address, &result);
        self.inline.lock().await.record(&result);
        result.is_ok()
    }

    /// Wait for every queued verification and summarize the outcomes,
    /// inline ones included.
    pub async fn drain(&self) -> VerificationSummary {
        let mut tasks = self.tasks.lock().await;
        let mut summary = std::mem::take(&mut *self.inline.lock().await);
        while let Some(joined) = tasks.join_next().await {
            let (address, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(network = %self.network, error = %e, "verification task aborted");
                    summary.failed += 1;
                    continue;
                }
            };
            log_outcome(&self.network, address, &result);
            summary.record(&result);
        }
        if summary.failed > 0 {
            warn!(network = %self.network, failed = summary.failed, "some verifications failed");
        }
        summary
    }
}

fn log_outcome(network: &str, address: Address, result: &ChainResult<VerifyOutcome>) {
    match result {
        Ok(VerifyOutcome::Verified) => info!(network, %address, "contract verified"),
        Ok(VerifyOutcome::AlreadyVerified) => debug!(network, %address, "contract already verified"),
        Ok(VerifyOutcome::Skipped) => debug!(network, %address, "verification skipped"),
        Err(ChainError::Verification(reason)) => {
            warn!(network, %address, %reason, "verification failed")
        }
        Err(e) => warn!(network, %address, error = %e, "verification failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedExplorer;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    #[tokio::test]
    async fn drain_counts_outcomes() {
        let explorer = Arc::new(SimulatedExplorer::new());
        let queue = VerificationQueue::new(explorer.clone(), "base");

        queue.submit(addr(1), None).await;
        queue.submit(addr(2), Some("Strategy")).await;
        let first = queue.drain().await;
        assert_eq!(first.verified, 2);

        queue.submit(addr(1), None).await;
        let second = queue.drain().await;
        assert_eq!(second.already_verified, 1);
        assert_eq!(explorer.verified().len(), 2);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let explorer = Arc::new(SimulatedExplorer::new());
        explorer.set_failing(true);
        let queue = VerificationQueue::new(explorer, "base");

        queue.submit(addr(3), None).await;
        assert!(!queue.verify_now(addr(4), None).await);
        let summary = queue.drain().await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.verified, 0);
    }

    #[tokio::test]
    async fn inline_outcomes_reach_the_summary() {
        let queue = VerificationQueue::new(Arc::new(SimulatedExplorer::new()), "base");

        assert!(queue.verify_now(addr(5), Some("StrategyV2")).await);
        assert!(queue.verify_now(addr(5), None).await);
        queue.submit(addr(6), None).await;

        let summary = queue.drain().await;
        assert_eq!(summary.verified, 2);
        assert_eq!(summary.already_verified, 1);
        assert_eq!(queue.drain().await, VerificationSummary::default());
    }

    #[tokio::test]
    async fn drain_with_nothing_queued() {
        let queue = VerificationQueue::new(Arc::new(SimulatedExplorer::new()), "base");
        assert_eq!(queue.drain().await, VerificationSummary::default());
    }
}
