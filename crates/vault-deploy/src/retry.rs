//! Unbounded retry around a single state-mutating step.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vault_core::config::RetryConfig;

use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.delay())
    }
}

/// Run `op` until it succeeds.
///
/// There is no attempt cap. Every failure is logged, then the loop sleeps
/// for the policy delay. `cancel` is checked before each attempt and raced
/// against the sleep; once it fires the loop stops with
/// [`DeployError::Cancelled`]. An attempt already in flight is not
/// interrupted.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    step: &str,
    mut op: F,
) -> DeployResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled {
                step: step.to_string(),
            });
        }
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(step, attempt, "step succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(step, attempt, error = %e, "step failed");
                warn!(
                    step,
                    delay_ms = policy.delay.as_millis() as u64,
                    "retrying; check the RPC endpoint and deployer balance if this persists"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(DeployError::Cancelled {
                    step: step.to_string(),
                });
            }
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
