//! Investable factory: deploys one investable and wires it up.
//!
//! Transaction order is fixed:
//!
//! 1. investment token proxy
//! 2. price oracle proxy (strategies only)
//! 3. investable proxy, initialized with its archetype's constructor struct
//! 4. `addInvestable` per member, in descriptor order (portfolios only)
//! 5. token ownership → investable
//! 6. investable ownership → owner (only when the descriptor names a valid one)
//!
//! Each transaction is retried on its own. A failure that outlasts the run
//! leaves the earlier steps in place; nothing is undone.

use tracing::{debug, info, warn};
use vault_core::{
    AbiValue, Address, ContractRef, DeployUnit, InvestableSpec, Kind, LinkTable,
};
use vault_chain::{ChainClient, ContractCall, ContractFactory};
use vault_state::LiveRecord;

use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::init::{IndexInit, InitArgs, PortfolioInit, StrategyInit};

/// Contract name of the share token every investable issues.
pub const INVESTMENT_TOKEN_CONTRACT: &str = "InvestmentToken";

/// Outcome of a successful factory run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedInvestable {
    pub record: LiveRecord,
    pub investment_token: Address,
    pub price_oracle: Option<Address>,
    pub members: Vec<Address>,
}

pub struct InvestableFactory<'a> {
    ctx: &'a DeployContext,
}

impl<'a> InvestableFactory<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self { ctx }
    }

    /// Deploy `unit` with its libraries already resolved into `links`.
    ///
    /// Does not write the live record; the caller does that once this
    /// returns.
    pub async fn deploy(
        &self,
        unit: &DeployUnit,
        spec: &InvestableSpec,
        links: &LinkTable,
    ) -> DeployResult<DeployedInvestable> {
        let members = self.resolve_members(unit, spec)?;
        let chain = self.ctx.chain.as_ref();
        let name = unit.name.as_str();

        // Factory lookups fail on missing artifacts or links, which no retry
        // can fix, so they all happen before the first transaction.
        let token_factory = chain.contract_factory(INVESTMENT_TOKEN_CONTRACT, &LinkTable::new()).await?;
        let oracle_factory = match (unit.kind, &spec.oracle) {
            (Kind::Strategy, Some(oracle)) => Some(chain.contract_factory(&oracle.contract_name, &LinkTable::new()).await?),
            _ => None,
        };
        let investable_factory = chain.contract_factory(&unit.contract_name, links).await?;

        let token_args = [
            AbiValue::string(spec.token_args.name.as_str()),
            AbiValue::string(spec.token_args.symbol.as_str()),
        ];
        let investment_token = self
            .ctx
            .retry(&format!("deploy investment token for {name}"), || {
                chain.deploy_proxy(&token_factory, &token_args)
            })
            .await?;
        self.ctx
            .verification
            .submit(investment_token, Some(INVESTMENT_TOKEN_CONTRACT))
            .await;
        debug!(unit = name, token = %investment_token, "investment token deployed");

        let price_oracle = match (&oracle_factory, &spec.oracle) {
            (Some(factory), Some(oracle)) => {
                let address = self
                    .ctx
                    .retry(&format!("deploy price oracle for {name}"), || {
                        chain.deploy_proxy(factory, &oracle.args)
                    })
                    .await?;
                self.ctx
                    .verification
                    .submit(address, Some(&oracle.contract_name))
                    .await;
                debug!(unit = name, oracle = %address, "price oracle deployed");
                Some(address)
            }
            _ => None,
        };

        let init = self.init_args(unit, spec, investment_token, price_oracle);
        let address = self
            .deploy_investable(chain, name, &investable_factory, init.into_abi())
            .await?;
        self.ctx
            .verification
            .submit(address, Some(&unit.contract_name))
            .await;

        for (member, allocation) in members.iter().zip(&spec.allocations) {
            let call = ContractCall::new(
                address,
                "addInvestable",
                vec![
                    AbiValue::Address(*member),
                    AbiValue::Array(allocation.iter().copied().map(AbiValue::from).collect()),
                ],
            );
            self.send(&format!("add investable {member} to {name}"), &call).await?;
        }

        let token_transfer = ContractCall::new(
            investment_token,
            "transferOwnership",
            vec![AbiValue::Address(address)],
        );
        self.send(&format!("transfer {name} token ownership"), &token_transfer)
            .await?;

        match spec.owner {
            Some(owner) => {
                let transfer = ContractCall::new(address, "transferOwnership", vec![AbiValue::Address(owner)]);
                self.send(&format!("transfer {name} ownership"), &transfer).await?;
            }
            None => debug!(unit = name, "no owner configured, deployer keeps ownership"),
        }

        info!(
            network = %self.ctx.network,
            kind = %unit.kind,
            unit = name,
            %address,
            members = members.len(),
            "investable deployed"
        );

        Ok(DeployedInvestable {
            record: LiveRecord {
                name: unit.name.clone(),
                address,
                owner: spec.owner,
                multisig: spec.multisig,
            },
            investment_token,
            price_oracle,
            members,
        })
    }

    /// Resolve portfolio members through the live store. Runs before any
    /// transaction so a bad reference costs nothing.
    fn resolve_members(&self, unit: &DeployUnit, spec: &InvestableSpec) -> DeployResult<Vec<Address>> {
        if unit.kind != Kind::Portfolio {
            if !spec.investables.is_empty() {
                warn!(
                    unit = %unit.name,
                    kind = %unit.kind,
                    "only portfolios register investables, ignoring `investables`"
                );
            }
            return Ok(Vec::new());
        }

        spec.investables
            .iter()
            .map(|reference| match reference {
                ContractRef::Literal(address) => Ok(*address),
                ContractRef::Symbolic { kind, name } => {
                    let key = self.ctx.key(*kind, name)?;
                    self.ctx
                        .store
                        .find(&key)?
                        .map(|record| record.address)
                        .ok_or_else(|| DeployError::UnresolvedReference {
                            unit: unit.name.clone(),
                            reference: reference.to_string(),
                        })
                }
            })
            .collect()
    }

    fn init_args(
        &self,
        unit: &DeployUnit,
        spec: &InvestableSpec,
        investment_token: Address,
        price_oracle: Option<Address>,
    ) -> InitArgs {
        match unit.kind {
            Kind::Portfolio => InitArgs::Portfolio(PortfolioInit {
                investment_token,
                deposit_token: spec.deposit_token,
                fees: spec.fee_args.clone(),
                investment_limit: spec.investment_limit.clone(),
                extra_args: spec.extra_args.clone(),
            }),
            Kind::Index => InitArgs::Index(IndexInit {
                investment_token,
                deposit_token: spec.deposit_token,
                swap_service: spec.swap_service.clone(),
                fees: spec.fee_args.clone(),
                investment_limit: spec.investment_limit.clone(),
                extra_args: spec.extra_args.clone(),
            }),
            // Library units never carry an investable body.
            Kind::Strategy | Kind::Library => InitArgs::Strategy(StrategyInit {
                investment_token,
                deposit_token: spec.deposit_token,
                price_oracle: price_oracle.unwrap_or(Address::ZERO),
                swap_service: spec.swap_service.clone(),
                fees: spec.fee_args.clone(),
                investment_limit: spec.investment_limit.clone(),
                role_to_users: spec.role_to_users.clone(),
                extra_args: spec.extra_args.clone(),
            }),
        }
    }

    async fn deploy_investable(
        &self,
        chain: &dyn ChainClient,
        name: &str,
        factory: &ContractFactory,
        init: AbiValue,
    ) -> DeployResult<Address> {
        let init = [init];
        self.ctx
            .retry(&format!("deploy {name}"), || chain.deploy_proxy(factory, &init))
            .await
    }

    async fn send(&self, step: &str, call: &ContractCall) -> DeployResult<()> {
        let chain = self.ctx.chain.as_ref();
        let receipt = self.ctx.retry(step, || chain.send(call)).await?;
        debug!(step, tx = %receipt.tx_hash, block = receipt.block, "transaction mined");
        Ok(())
    }
}
