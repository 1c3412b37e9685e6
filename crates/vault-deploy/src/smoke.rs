//! Post-deploy smoke run: approve, deposit, withdraw part of the shares.
//!
//! Steps are sent once, without the retry loop. A failure is reported, not
//! raised; the deployment it follows stays committed.

use tracing::{info, warn};
use vault_core::config::SmokeConfig;
use vault_core::{AbiValue, Address, Amount};
use vault_chain::ContractCall;

use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub deposited: Amount,
    pub shares_received: Amount,
    pub withdrawn: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    Passed(SmokeReport),
    Failed(String),
    Skipped,
}

impl SmokeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SmokeOutcome::Failed(_))
    }
}

pub struct SmokeValidator<'a> {
    ctx: &'a DeployContext,
    config: &'a SmokeConfig,
}

impl<'a> SmokeValidator<'a> {
    pub fn new(ctx: &'a DeployContext, config: &'a SmokeConfig) -> Self {
        Self { ctx, config }
    }

    pub async fn run(&self, investable: Address, deposit_token: Address, investment_token: Address) -> SmokeOutcome {
        match self.round_trip(investable, deposit_token, investment_token).await {
            Ok(report) => {
                info!(
                    network = %self.ctx.network,
                    %investable,
                    deposited = %report.deposited,
                    shares = %report.shares_received,
                    withdrawn = %report.withdrawn,
                    "smoke run passed"
                );
                SmokeOutcome::Passed(report)
            }
            Err(e) => {
                warn!(network = %self.ctx.network, %investable, error = %e, "smoke run failed");
                SmokeOutcome::Failed(e.to_string())
            }
        }
    }

    async fn round_trip(
        &self,
        investable: Address,
        deposit_token: Address,
        investment_token: Address,
    ) -> DeployResult<SmokeReport> {
        let chain = self.ctx.chain.as_ref();
        let deployer = chain.deployer();

        let decimals = chain
            .read(&ContractCall::new(deposit_token, "decimals", vec![]))
            .await?
            .as_uint()
            .and_then(|d| u8::try_from(d.0).ok())
            .ok_or_else(|| DeployError::Smoke(format!("{deposit_token} returned invalid decimals")))?;
        let amount = Amount::from_units(u128::from(self.config.deposit_units), decimals)
            .ok_or_else(|| DeployError::Smoke("deposit amount overflows".to_string()))?;

        let shares_before = self.balance(investment_token, deployer).await?;
        chain
            .send(&ContractCall::new(
                deposit_token,
                "approve",
                vec![AbiValue::Address(investable), AbiValue::Uint(amount)],
            ))
            .await?;
        chain
            .send(&ContractCall::new(investable, "deposit", vec![AbiValue::Uint(amount)]))
            .await?;
        let shares_after = self.balance(investment_token, deployer).await?;

        let received = Amount(shares_after.0.saturating_sub(shares_before.0));
        if received == Amount::ZERO {
            return Err(DeployError::Smoke("deposit minted no shares".to_string()));
        }
        let withdrawn = received.percent(self.config.withdraw_percent);
        chain
            .send(&ContractCall::new(investable, "withdraw", vec![AbiValue::Uint(withdrawn)]))
            .await?;

        Ok(SmokeReport {
            deposited: amount,
            shares_received: received,
            withdrawn,
        })
    }

    async fn balance(&self, token: Address, holder: Address) -> DeployResult<Amount> {
        let value = self
            .ctx
            .chain
            .read(&ContractCall::new(token, "balanceOf", vec![AbiValue::Address(holder)]))
            .await?;
        value
            .as_uint()
            .ok_or_else(|| DeployError::Smoke(format!("balanceOf on {token} returned {}", value.type_name())))
    }
}
