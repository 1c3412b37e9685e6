//! Upgrade proposer: turns an upgrade descriptor into upgrades or proposals.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vault_chain::{ProposalRequest, ProposalService, VerificationSummary};
use vault_core::config::NetworkConfig;
use vault_core::descriptor::load_upgrade_units;
use vault_core::{Address, ContractRef, InvestableKey, UpgradeUnit};
use vault_deploy::{DeployContext, LibraryDeployer, RedeployPolicy};
use vault_state::{LiveRecord, StateError};

use crate::error::{UpgradeError, UpgradeResult};
use crate::state::Upgrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeMode {
    /// Impersonate the custody account and upgrade in place.
    Fork,
    /// Deploy the implementation and hand the upgrade to the multisig.
    Production,
}

impl From<&NetworkConfig> for UpgradeMode {
    fn from(network: &NetworkConfig) -> Self {
        if network.fork {
            UpgradeMode::Fork
        } else {
            UpgradeMode::Production
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeReport {
    pub network: String,
    pub upgrades: Vec<Upgrade>,
    pub verification: VerificationSummary,
}

/// A proxy resolved against live state, with the account allowed to
/// upgrade it.
struct Target {
    key: InvestableKey,
    record: LiveRecord,
    authority: Address,
}

pub struct UpgradeProposer {
    ctx: DeployContext,
    proposals: Arc<dyn ProposalService>,
    mode: UpgradeMode,
}

impl UpgradeProposer {
    pub fn new(ctx: DeployContext, proposals: Arc<dyn ProposalService>, mode: UpgradeMode) -> Self {
        Self { ctx, proposals, mode }
    }

    /// Run every unit of the upgrade descriptor at `path`, in order.
    ///
    /// All proxies and their authorities are resolved before the first
    /// library or implementation is deployed. Libraries listed by a unit are
    /// always deployed fresh, once per run, so the new implementation never
    /// links against the bytecode it replaces.
    pub async fn run(&self, path: &Path) -> UpgradeResult<UpgradeReport> {
        let units = load_upgrade_units(path)?;
        let targets = units
            .iter()
            .map(|unit| self.resolve_target(&unit.proxy))
            .collect::<UpgradeResult<Vec<_>>>()?;

        info!(
            network = %self.ctx.network,
            mode = ?self.mode,
            units = units.len(),
            "upgrade started"
        );

        let library_ctx = self.ctx.clone().with_redeploy(RedeployPolicy::Force);
        let mut libraries = LibraryDeployer::new(&library_ctx);
        let mut upgrades = Vec::with_capacity(units.len());
        for (unit, target) in units.iter().zip(targets) {
            upgrades.push(self.execute(unit, target, &mut libraries).await?);
        }

        let verification = self.ctx.verification.drain().await;
        Ok(UpgradeReport {
            network: self.ctx.network.clone(),
            upgrades,
            verification,
        })
    }

    fn resolve_target(&self, proxy: &ContractRef) -> UpgradeResult<Target> {
        let (key, record) = match proxy {
            ContractRef::Symbolic { kind, name } => {
                let key = self.ctx.key(*kind, name)?;
                match self.ctx.store.get(&key) {
                    Ok(record) => (key, record),
                    Err(StateError::NotFound(_)) => return Err(UpgradeError::ProxyNotFound(proxy.to_string())),
                    Err(e) => return Err(e.into()),
                }
            }
            ContractRef::Literal(address) => self
                .ctx
                .store
                .list(&self.ctx.network, None)?
                .into_iter()
                .find(|(_, record)| record.address == *address)
                .ok_or_else(|| UpgradeError::ProxyNotFound(proxy.to_string()))?,
        };

        let authority = record
            .upgrade_authority()
            .ok_or_else(|| UpgradeError::NoAuthorizedSigner { proxy: key.to_string() })?;
        Ok(Target { key, record, authority })
    }

    async fn execute(
        &self,
        unit: &UpgradeUnit,
        target: Target,
        libraries: &mut LibraryDeployer<'_>,
    ) -> UpgradeResult<Upgrade> {
        let Target { key, record, authority } = target;
        let chain = self.ctx.chain.as_ref();
        let proxy = record.address;
        let mut upgrade = Upgrade::new(key.clone(), proxy, &unit.new_implementation);

        // Impersonation comes first so a network that cannot impersonate
        // fails before anything is deployed.
        let signer = match self.mode {
            UpgradeMode::Fork => Some(chain.impersonate(authority).await?),
            UpgradeMode::Production => None,
        };

        let links = libraries.deploy_all(&unit.libraries).await?;
        let factory = chain.contract_factory(&unit.new_implementation, &links).await?;
        let call = unit.post_upgrade_call.as_ref();

        match signer {
            Some(signer) => {
                let implementation = self
                    .ctx
                    .retry(&format!("upgrade {key}"), || chain.upgrade_proxy(proxy, &factory, call, &signer))
                    .await?;
                upgrade.mark_upgraded(implementation)?;
                info!(
                    %key,
                    %implementation,
                    signer = %signer.address,
                    post_upgrade_call = ?call.map(|c| c.function_name.as_str()),
                    "proxy upgraded"
                );

                if self
                    .ctx
                    .verification
                    .verify_now(implementation, Some(&unit.new_implementation))
                    .await
                {
                    upgrade.mark_verified()?;
                }
            }
            None => {
                let implementation = self
                    .ctx
                    .retry(&format!("prepare upgrade of {key}"), || chain.prepare_upgrade(proxy, &factory))
                    .await?;
                let call_data = match call {
                    Some(c) => Some(chain.encode_call(&factory, &c.function_name, &c.args)?),
                    None => None,
                };
                let request = ProposalRequest {
                    network: self.ctx.network.clone(),
                    contract_address: proxy,
                    contract_name: record.name.clone(),
                    new_implementation: implementation,
                    call_data,
                    via: authority,
                };
                let proposals = self.proposals.as_ref();
                let proposal = self
                    .ctx
                    .retry(&format!("propose upgrade of {key}"), || proposals.create_proposal(&request))
                    .await?;
                upgrade.mark_proposed(&proposal.url, &proposal.metadata.proposal_id, implementation)?;
                info!(%key, %implementation, via = %authority, url = %proposal.url, "upgrade proposed");

                match proposal.metadata.new_implementation_address {
                    Some(address) => {
                        self.ctx
                            .verification
                            .verify_now(address, Some(&unit.new_implementation))
                            .await;
                    }
                    None => warn!(
                        %key,
                        proposal = %proposal.metadata.proposal_id,
                        "proposal did not report the implementation address, skipping verification"
                    ),
                }
            }
        }

        Ok(upgrade)
    }
}
