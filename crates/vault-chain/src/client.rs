//! The chain client boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vault_core::{AbiValue, Address, LinkTable, PostUpgradeCall};

use crate::error::ChainResult;

/// A compiled contract artifact with its libraries linked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFactory {
    pub contract_name: String,
    pub links: LinkTable,
    /// Hash of the linked bytecode, used to tell implementations apart.
    pub bytecode_hash: String,
}

/// An account that can sign transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub address: Address,
    /// Acquired through fork-mode impersonation rather than a real key.
    pub impersonated: bool,
}

/// A call against a deployed contract. `from: None` means the deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub function: String,
    pub args: Vec<AbiValue>,
    pub from: Option<Address>,
}

impl ContractCall {
    pub fn new(to: Address, function: &str, args: Vec<AbiValue>) -> Self {
        Self {
            to,
            function: function.to_string(),
            args,
            from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block: u64,
}

/// Everything the orchestrator needs from a chain.
///
/// Implementations are expected to sign with a single deployer account and
/// to be driven sequentially; the orchestrator never issues two
/// transactions concurrently.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account paying for and signing deployments and calls.
    fn deployer(&self) -> Address;

    /// Look up a contract artifact by name, linking the given libraries.
    async fn contract_factory(&self, contract: &str, links: &LinkTable) -> ChainResult<ContractFactory>;

    /// Deploy a non-upgradeable contract (libraries, helpers).
    async fn deploy(&self, factory: &ContractFactory, args: &[AbiValue]) -> ChainResult<Address>;

    /// Deploy an implementation behind a new upgradeable proxy, calling its
    /// initializer with `init_args`. Returns the proxy address.
    async fn deploy_proxy(&self, factory: &ContractFactory, init_args: &[AbiValue]) -> ChainResult<Address>;

    /// Point `proxy` at a freshly deployed implementation of `factory`,
    /// optionally calling `call` in the same transaction. Returns the new
    /// implementation address.
    async fn upgrade_proxy(
        &self,
        proxy: Address,
        factory: &ContractFactory,
        call: Option<&PostUpgradeCall>,
        signer: &Signer,
    ) -> ChainResult<Address>;

    /// Deploy the implementation for a future upgrade of `proxy` without
    /// executing the upgrade. Returns the implementation address.
    async fn prepare_upgrade(&self, proxy: Address, factory: &ContractFactory) -> ChainResult<Address>;

    /// Acquire a signer for `account` on a fork or test chain.
    async fn impersonate(&self, account: Address) -> ChainResult<Signer>;

    /// Send a state-mutating call.
    async fn send(&self, call: &ContractCall) -> ChainResult<TxReceipt>;

    /// Evaluate a view call.
    async fn read(&self, call: &ContractCall) -> ChainResult<AbiValue>;

    /// Encode `function(args)` as `0x`-prefixed call data for `factory`'s ABI.
    fn encode_call(&self, factory: &ContractFactory, function: &str, args: &[AbiValue]) -> ChainResult<String>;
}
