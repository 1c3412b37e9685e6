//! Deploy pipeline: one descriptor, start to finish.

use std::path::PathBuf;

use tracing::{info, warn};
use vault_core::config::SmokeConfig;
use vault_core::descriptor::load_deploy_units;
use vault_core::{Address, DeployUnit, InvestableKey, Kind, LinkTable, UnitBody};
use vault_chain::VerificationSummary;
use vault_state::LiveRecord;

use crate::context::{DeployContext, RedeployPolicy};
use crate::error::{DeployError, DeployResult};
use crate::factory::InvestableFactory;
use crate::libraries::LibraryDeployer;
use crate::smoke::{SmokeOutcome, SmokeValidator};

/// Which descriptor to run and which of its units is the top-level one.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub descriptor: PathBuf,
    pub kind: Kind,
    pub name: String,
    pub skip_smoke: bool,
}

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub network: String,
    /// Live record of every unit in the descriptor, in deployment order.
    pub deployed: Vec<(InvestableKey, LiveRecord)>,
    /// Every library linked during the run, reused ones included.
    pub libraries: LinkTable,
    pub smoke: SmokeOutcome,
    pub verification: VerificationSummary,
}

pub struct DeployPipeline {
    ctx: DeployContext,
    smoke: SmokeConfig,
}

impl DeployPipeline {
    pub fn new(ctx: DeployContext, smoke: SmokeConfig) -> Self {
        Self { ctx, smoke }
    }

    pub async fn run(&self, request: &DeployRequest) -> DeployResult<DeploymentReport> {
        let units = load_deploy_units(&request.descriptor)?;
        let top = units
            .iter()
            .position(|u| u.kind == request.kind && u.name == request.name)
            .ok_or_else(|| DeployError::UnitNotFound {
                kind: request.kind,
                name: request.name.clone(),
            })?;
        self.check_redeploy(&units)?;

        info!(
            network = %self.ctx.network,
            descriptor = %request.descriptor.display(),
            units = units.len(),
            top = %request.name,
            "deployment started"
        );

        let mut report = DeploymentReport {
            network: self.ctx.network.clone(),
            deployed: Vec::new(),
            libraries: LinkTable::new(),
            smoke: SmokeOutcome::Skipped,
            verification: VerificationSummary::default(),
        };

        let mut libraries = LibraryDeployer::new(&self.ctx);
        for (index, unit) in units.iter().enumerate() {
            let links = libraries.deploy_all(&unit.libraries).await?;

            match &unit.body {
                UnitBody::Library => {
                    let dependencies: Vec<String> = unit.libraries.iter().map(|l| l.name.clone()).collect();
                    let address = libraries
                        .deploy_one(&unit.name, &unit.contract_name, &dependencies)
                        .await?;
                    let key = self.ctx.key(Kind::Library, &unit.name)?;
                    report.deployed.push((key, LiveRecord::new(&unit.name, address)));
                }
                UnitBody::Investable(spec) => {
                    let deployed = InvestableFactory::new(&self.ctx).deploy(unit, spec, &links).await?;
                    let key = self.ctx.key(unit.kind, &unit.name)?;
                    self.ctx.store.put(&key, &deployed.record)?;
                    info!(%key, address = %deployed.record.address, "live record written");

                    if index == top {
                        report.smoke = self
                            .smoke_run(request, deployed.record.address, spec.deposit_token, deployed.investment_token)
                            .await;
                    }
                    report.deployed.push((key, deployed.record));
                }
            }
        }

        report.libraries = libraries.linked().clone();
        report.verification = self.ctx.verification.drain().await;
        info!(
            network = %self.ctx.network,
            deployed = report.deployed.len(),
            verified = report.verification.verified,
            "deployment finished"
        );
        Ok(report)
    }

    /// Under the reject policy any existing investable record stops the run
    /// before the first transaction.
    fn check_redeploy(&self, units: &[DeployUnit]) -> DeployResult<()> {
        if self.ctx.redeploy == RedeployPolicy::Force {
            return Ok(());
        }
        for unit in units.iter().filter(|u| u.kind.is_investable()) {
            let key = self.ctx.key(unit.kind, &unit.name)?;
            if let Some(existing) = self.ctx.store.find(&key)? {
                warn!(%key, address = %existing.address, "refusing to redeploy");
                return Err(DeployError::AlreadyDeployed(key.to_string()));
            }
        }
        Ok(())
    }

    async fn smoke_run(
        &self,
        request: &DeployRequest,
        investable: Address,
        deposit_token: Address,
        investment_token: Address,
    ) -> SmokeOutcome {
        if request.skip_smoke || !self.smoke.enabled {
            info!(unit = %request.name, "smoke run skipped");
            return SmokeOutcome::Skipped;
        }
        SmokeValidator::new(&self.ctx, &self.smoke)
            .run(investable, deposit_token, investment_token)
            .await
    }
}
