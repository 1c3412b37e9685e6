//! In-memory chain and explorer used by the test suite and rehearsal runs.
//!
//! `SimulatedChain` models just enough of an EVM deployment flow to drive the
//! orchestrator end to end: deterministic contract addresses, proxies with a
//! swappable implementation, `Ownable` checks, portfolio membership, and a
//! 1:1 share-minting vault for deposit/withdraw smoke runs. Failures can be
//! injected per operation or per function to exercise the retry loop.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use vault_core::{AbiValue, Address, Amount, LinkTable, PostUpgradeCall};

use crate::client::{ChainClient, ContractCall, ContractFactory, Signer, TxReceipt};
use crate::error::{ChainError, ChainResult};
use crate::verify::{Verifier, VerifyOutcome, VerifyRequest};

const DEFAULT_DECIMALS: u8 = 18;

/// Chain operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimOp {
    ContractFactory,
    Deploy,
    DeployProxy,
    UpgradeProxy,
    PrepareUpgrade,
    Send,
    Read,
}

/// A successfully mined simulated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTx {
    pub op: SimOp,
    /// Contract name for deployments, function name for calls.
    pub label: String,
    pub to: Option<Address>,
    pub from: Address,
    pub args: Vec<AbiValue>,
}

#[derive(Debug, Clone)]
struct Deployed {
    contract_name: String,
    init_args: Vec<AbiValue>,
}

#[derive(Debug, Default)]
struct SimState {
    nonce: u64,
    block: u64,
    contracts: HashMap<Address, Deployed>,
    proxies: HashMap<Address, Address>,
    owners: HashMap<Address, Address>,
    members: HashMap<Address, Vec<Address>>,
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    decimals: HashMap<Address, u8>,
    required_links: HashMap<String, Vec<String>>,
    fail_ops: HashMap<SimOp, u32>,
    fail_functions: HashMap<String, u32>,
    attempts: HashMap<SimOp, u32>,
    txs: Vec<SimTx>,
}

/// Contract name of proxies installed with [`SimulatedChain::install_proxy`].
pub const RESTORED_CONTRACT: &str = "RestoredProxy";

pub struct SimulatedChain {
    deployer: Address,
    fork: bool,
    state: Mutex<SimState>,
}

impl SimulatedChain {
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            fork: false,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Allow account impersonation, as on a local fork.
    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn with_token_decimals(self, token: Address, decimals: u8) -> Self {
        self.state().decimals.insert(token, decimals);
        self
    }

    /// Make `contract_factory(contract)` fail unless `library` is linked.
    pub fn require_link(self, contract: &str, library: &str) -> Self {
        self.state()
            .required_links
            .entry(contract.to_string())
            .or_default()
            .push(library.to_string());
        self
    }

    /// The next `times` calls of `op` fail with a transient RPC error.
    pub fn fail_next(&self, op: SimOp, times: u32) {
        self.state().fail_ops.insert(op, times);
    }

    /// The next `times` sends of `function` revert.
    pub fn fail_function(&self, function: &str, times: u32) {
        self.state().fail_functions.insert(function.to_string(), times);
    }

    /// Every call of `op` so far, including failed ones.
    pub fn attempts(&self, op: SimOp) -> u32 {
        self.state().attempts.get(&op).copied().unwrap_or(0)
    }

    pub fn transactions(&self) -> Vec<SimTx> {
        self.state().txs.clone()
    }

    /// Labels of mined transactions, in order.
    pub fn tx_labels(&self) -> Vec<String> {
        self.state().txs.iter().map(|tx| tx.label.clone()).collect()
    }

    /// Function names of mined `send` calls, in order.
    pub fn sent_functions(&self) -> Vec<String> {
        self.state()
            .txs
            .iter()
            .filter(|tx| tx.op == SimOp::Send)
            .map(|tx| tx.label.clone())
            .collect()
    }

    pub fn count(&self, op: SimOp) -> usize {
        self.state().txs.iter().filter(|tx| tx.op == op).count()
    }

    pub fn contract_name_at(&self, address: Address) -> Option<String> {
        self.state()
            .contracts
            .get(&address)
            .map(|c| c.contract_name.clone())
    }

    pub fn implementation_of(&self, proxy: Address) -> Option<Address> {
        self.state().proxies.get(&proxy).copied()
    }

    pub fn owner_of(&self, contract: Address) -> Option<Address> {
        self.state().owners.get(&contract).copied()
    }

    /// Investables registered on a portfolio through `addInvestable`.
    pub fn members_of(&self, portfolio: Address) -> Vec<Address> {
        self.state().members.get(&portfolio).cloned().unwrap_or_default()
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.state().balance(self.deployer, token, holder)
    }

    /// Install a proxy at `proxy` owned by `owner`, as if deployed by an
    /// earlier run. Used to replay live state into a fresh simulator.
    ///
    /// Live records do not name the implementation contract, so the proxy and
    /// its implementation are recorded as [`RESTORED_CONTRACT`] until the
    /// first upgrade.
    pub fn install_proxy(&self, proxy: Address, owner: Address) {
        let mut state = self.state();
        let salt = format!("{RESTORED_CONTRACT}:{proxy}");
        let implementation = state.next_address(self.deployer, &salt);
        let deployed = Deployed {
            contract_name: RESTORED_CONTRACT.to_string(),
            init_args: Vec::new(),
        };
        state.contracts.insert(implementation, deployed.clone());
        state.contracts.insert(proxy, deployed);
        state.proxies.insert(proxy, implementation);
        state.owners.insert(proxy, owner);
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimState {
    fn next_address(&mut self, deployer: Address, salt: &str) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(deployer.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(salt.as_bytes());
        self.nonce += 1;
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..32]);
        Address::from_bytes(bytes)
    }

    /// Count the attempt and consume one injected failure, if armed.
    fn attempt(&mut self, op: SimOp, function: Option<&str>) -> ChainResult<()> {
        *self.attempts.entry(op).or_default() += 1;
        if let Some(remaining) = self.fail_ops.get_mut(&op).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(ChainError::Rpc(format!("injected {op:?} failure")));
        }
        if let Some(name) = function
            && let Some(remaining) = self.fail_functions.get_mut(name).filter(|n| **n > 0)
        {
            *remaining -= 1;
            return Err(ChainError::Reverted(format!("injected `{name}` revert")));
        }
        Ok(())
    }

    fn mine(&mut self, tx: SimTx) -> TxReceipt {
        self.block += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.block.to_be_bytes());
        hasher.update(tx.label.as_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));
        trace!(block = self.block, label = %tx.label, "simulated tx mined");
        self.txs.push(tx);
        TxReceipt {
            tx_hash,
            block: self.block,
        }
    }

    fn balance(&self, deployer: Address, token: Address, holder: Address) -> u128 {
        match self.balances.get(&(token, holder)) {
            Some(balance) => *balance,
            // Foreign tokens: the deployer is treated as a whale.
            None if !self.contracts.contains_key(&token) && holder == deployer => u128::MAX,
            None => 0,
        }
    }

    fn set_balance(&mut self, token: Address, holder: Address, amount: u128) {
        self.balances.insert((token, holder), amount);
    }

    /// `(investmentToken, depositToken)` from an investable's init struct.
    fn vault_tokens(&self, investable: Address) -> ChainResult<(Address, Address)> {
        let deployed = self
            .contracts
            .get(&investable)
            .ok_or_else(|| ChainError::Reverted(format!("no contract at {investable}")))?;
        let fields = match deployed.init_args.first() {
            Some(AbiValue::Tuple(fields)) => fields,
            _ => return Err(ChainError::Reverted(format!("{investable} is not an investable"))),
        };
        match (
            fields.first().and_then(AbiValue::as_address),
            fields.get(1).and_then(AbiValue::as_address),
        ) {
            (Some(investment), Some(deposit)) => Ok((investment, deposit)),
            _ => Err(ChainError::Reverted(format!("{investable} is not an investable"))),
        }
    }

    fn execute(&mut self, deployer: Address, from: Address, call: &ContractCall) -> ChainResult<()> {
        let to = call.to;
        match call.function.as_str() {
            "transferOwnership" => {
                let new_owner = address_arg(call, 0)?;
                let current = self.owners.get(&to).copied();
                if current != Some(from) {
                    return Err(ChainError::Reverted("Ownable: caller is not the owner".to_string()));
                }
                self.owners.insert(to, new_owner);
            }
            "addInvestable" => {
                let member = address_arg(call, 0)?;
                if self.owners.get(&to) != Some(&from) {
                    return Err(ChainError::Reverted("Ownable: caller is not the owner".to_string()));
                }
                self.members.entry(to).or_default().push(member);
            }
            "approve" => {
                let spender = address_arg(call, 0)?;
                let amount = uint_arg(call, 1)?;
                self.allowances.insert((to, from, spender), amount);
            }
            "deposit" => {
                let amount = uint_arg(call, 0)?;
                let (investment, deposit) = self.vault_tokens(to)?;
                let allowance = self.allowances.get(&(deposit, from, to)).copied().unwrap_or(0);
                if allowance < amount {
                    return Err(ChainError::Reverted("ERC20: insufficient allowance".to_string()));
                }
                let held = self.balance(deployer, deposit, from);
                if held < amount {
                    return Err(ChainError::Reverted("ERC20: transfer amount exceeds balance".to_string()));
                }
                self.allowances.insert((deposit, from, to), allowance - amount);
                self.set_balance(deposit, from, held - amount);
                let vault_held = self.balance(deployer, deposit, to);
                self.set_balance(deposit, to, vault_held.saturating_add(amount));
                let shares = self.balance(deployer, investment, from);
                self.set_balance(investment, from, shares.saturating_add(amount));
            }
            "withdraw" => {
                let shares = uint_arg(call, 0)?;
                let (investment, deposit) = self.vault_tokens(to)?;
                let held = self.balance(deployer, investment, from);
                if held < shares {
                    return Err(ChainError::Reverted("withdraw exceeds share balance".to_string()));
                }
                self.set_balance(investment, from, held - shares);
                let vault_held = self.balance(deployer, deposit, to);
                self.set_balance(deposit, to, vault_held.saturating_sub(shares));
                let returned = self.balance(deployer, deposit, from);
                self.set_balance(deposit, from, returned.saturating_add(shares));
            }
            other => debug!(function = other, %to, "simulated call accepted"),
        }
        Ok(())
    }
}

fn address_arg(call: &ContractCall, index: usize) -> ChainResult<Address> {
    call.args
        .get(index)
        .and_then(AbiValue::as_address)
        .ok_or_else(|| ChainError::Reverted(format!("`{}` expects an address at {index}", call.function)))
}

fn uint_arg(call: &ContractCall, index: usize) -> ChainResult<u128> {
    call.args
        .get(index)
        .and_then(AbiValue::as_uint)
        .map(|amount| amount.0)
        .ok_or_else(|| ChainError::Reverted(format!("`{}` expects a uint at {index}", call.function)))
}

fn signature(function: &str, args: &[AbiValue]) -> String {
    let types: Vec<String> = args.iter().map(AbiValue::type_name).collect();
    format!("{function}({})", types.join(","))
}

#[async_trait]
impl ChainClient for SimulatedChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn contract_factory(&self, contract: &str, links: &LinkTable) -> ChainResult<ContractFactory> {
        let mut state = self.state();
        state.attempt(SimOp::ContractFactory, None)?;
        if contract.trim().is_empty() {
            return Err(ChainError::UnknownContract(contract.to_string()));
        }
        if let Some(required) = state.required_links.get(contract) {
            if let Some(missing) = required.iter().find(|lib| !links.contains_key(*lib)) {
                return Err(ChainError::MissingLink {
                    contract: contract.to_string(),
                    library: missing.clone(),
                });
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(contract.as_bytes());
        for (name, address) in links {
            hasher.update(name.as_bytes());
            hasher.update(address.as_bytes());
        }
        Ok(ContractFactory {
            contract_name: contract.to_string(),
            links: links.clone(),
            bytecode_hash: hex::encode(hasher.finalize()),
        })
    }

    async fn deploy(&self, factory: &ContractFactory, args: &[AbiValue]) -> ChainResult<Address> {
        let mut state = self.state();
        state.attempt(SimOp::Deploy, None)?;
        let address = state.next_address(self.deployer, &factory.contract_name);
        state.contracts.insert(
            address,
            Deployed {
                contract_name: factory.contract_name.clone(),
                init_args: args.to_vec(),
            },
        );
        state.owners.insert(address, self.deployer);
        state.mine(SimTx {
            op: SimOp::Deploy,
            label: factory.contract_name.clone(),
            to: Some(address),
            from: self.deployer,
            args: args.to_vec(),
        });
        Ok(address)
    }

    async fn deploy_proxy(&self, factory: &ContractFactory, init_args: &[AbiValue]) -> ChainResult<Address> {
        let mut state = self.state();
        state.attempt(SimOp::DeployProxy, None)?;
        let implementation = state.next_address(self.deployer, &factory.contract_name);
        let proxy = state.next_address(self.deployer, "proxy");
        let deployed = Deployed {
            contract_name: factory.contract_name.clone(),
            init_args: init_args.to_vec(),
        };
        state.contracts.insert(implementation, deployed.clone());
        state.contracts.insert(proxy, deployed);
        state.proxies.insert(proxy, implementation);
        state.owners.insert(proxy, self.deployer);
        state.mine(SimTx {
            op: SimOp::DeployProxy,
            label: factory.contract_name.clone(),
            to: Some(proxy),
            from: self.deployer,
            args: init_args.to_vec(),
        });
        Ok(proxy)
    }

    async fn upgrade_proxy(
        &self,
        proxy: Address,
        factory: &ContractFactory,
        call: Option<&PostUpgradeCall>,
        signer: &Signer,
    ) -> ChainResult<Address> {
        let mut state = self.state();
        state.attempt(SimOp::UpgradeProxy, None)?;
        if !state.proxies.contains_key(&proxy) {
            return Err(ChainError::Reverted(format!("{proxy} is not a proxy")));
        }
        if state.owners.get(&proxy) != Some(&signer.address) {
            return Err(ChainError::Reverted("Ownable: caller is not the owner".to_string()));
        }
        let implementation = state.next_address(self.deployer, &factory.contract_name);
        state.contracts.insert(
            implementation,
            Deployed {
                contract_name: factory.contract_name.clone(),
                init_args: Vec::new(),
            },
        );
        if let Some(contract) = state.contracts.get_mut(&proxy) {
            contract.contract_name = factory.contract_name.clone();
        }
        state.proxies.insert(proxy, implementation);
        let args = call.map(|c| c.args.clone()).unwrap_or_default();
        let label = match call {
            Some(c) => format!("{}+{}", factory.contract_name, c.function_name),
            None => factory.contract_name.clone(),
        };
        state.mine(SimTx {
            op: SimOp::UpgradeProxy,
            label,
            to: Some(proxy),
            from: signer.address,
            args,
        });
        Ok(implementation)
    }

    async fn prepare_upgrade(&self, proxy: Address, factory: &ContractFactory) -> ChainResult<Address> {
        let mut state = self.state();
        state.attempt(SimOp::PrepareUpgrade, None)?;
        if !state.proxies.contains_key(&proxy) {
            return Err(ChainError::Reverted(format!("{proxy} is not a proxy")));
        }
        let implementation = state.next_address(self.deployer, &factory.contract_name);
        state.contracts.insert(
            implementation,
            Deployed {
                contract_name: factory.contract_name.clone(),
                init_args: Vec::new(),
            },
        );
        state.mine(SimTx {
            op: SimOp::PrepareUpgrade,
            label: factory.contract_name.clone(),
            to: Some(implementation),
            from: self.deployer,
            args: Vec::new(),
        });
        Ok(implementation)
    }

    async fn impersonate(&self, account: Address) -> ChainResult<Signer> {
        if !self.fork {
            return Err(ChainError::Signer(format!(
                "cannot impersonate {account} outside fork mode"
            )));
        }
        Ok(Signer {
            address: account,
            impersonated: true,
        })
    }

    async fn send(&self, call: &ContractCall) -> ChainResult<TxReceipt> {
        let mut state = self.state();
        state.attempt(SimOp::Send, Some(&call.function))?;
        let from = call.from.unwrap_or(self.deployer);
        state.execute(self.deployer, from, call)?;
        Ok(state.mine(SimTx {
            op: SimOp::Send,
            label: call.function.clone(),
            to: Some(call.to),
            from,
            args: call.args.clone(),
        }))
    }

    async fn read(&self, call: &ContractCall) -> ChainResult<AbiValue> {
        let mut state = self.state();
        state.attempt(SimOp::Read, None)?;
        match call.function.as_str() {
            "balanceOf" => {
                let holder = address_arg(call, 0)?;
                Ok(AbiValue::Uint(Amount(state.balance(self.deployer, call.to, holder))))
            }
            "decimals" => {
                let decimals = state.decimals.get(&call.to).copied().unwrap_or(DEFAULT_DECIMALS);
                Ok(AbiValue::from(u32::from(decimals)))
            }
            "owner" => state
                .owners
                .get(&call.to)
                .copied()
                .map(AbiValue::Address)
                .ok_or_else(|| ChainError::Reverted(format!("{} has no owner", call.to))),
            other => Err(ChainError::Rpc(format!("simulated chain cannot evaluate `{other}`"))),
        }
    }

    fn encode_call(&self, factory: &ContractFactory, function: &str, args: &[AbiValue]) -> ChainResult<String> {
        let selector = Sha256::digest(signature(function, args).as_bytes());
        let body = serde_json::to_vec(args).map_err(|e| ChainError::Rpc(e.to_string()))?;
        trace!(contract = %factory.contract_name, function, "encoded call data");
        Ok(format!("0x{}{}", hex::encode(&selector[..4]), hex::encode(body)))
    }
}

/// Explorer stand-in: first request per address verifies, later ones
/// report already verified.
#[derive(Debug, Default)]
pub struct SimulatedExplorer {
    verified: Mutex<BTreeSet<Address>>,
    names: Mutex<BTreeMap<Address, String>>,
    failing: AtomicBool,
}

impl SimulatedExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following request fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn verified(&self) -> Vec<Address> {
        self.verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    pub fn contract_name(&self, address: Address) -> Option<String> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address)
            .cloned()
    }
}

#[async_trait]
impl Verifier for SimulatedExplorer {
    async fn verify(&self, request: &VerifyRequest) -> ChainResult<VerifyOutcome> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChainError::Verification("explorer unavailable".to_string()));
        }
        if let Some(name) = &request.contract_name {
            self.names
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(request.address, name.clone());
        }
        let fresh = self
            .verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.address);
        Ok(if fresh {
            VerifyOutcome::Verified
        } else {
            VerifyOutcome::AlreadyVerified
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    async fn factory(chain: &SimulatedChain, name: &str) -> ContractFactory {
        chain.contract_factory(name, &LinkTable::new()).await.unwrap()
    }

    #[tokio::test]
    async fn addresses_are_deterministic() {
        let a = SimulatedChain::new(addr(1));
        let b = SimulatedChain::new(addr(1));
        let fa = factory(&a, "MathLib").await;
        let fb = factory(&b, "MathLib").await;
        let first = a.deploy(&fa, &[]).await.unwrap();
        assert_eq!(first, b.deploy(&fb, &[]).await.unwrap());
        assert_ne!(first, a.deploy(&fa, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn blank_contract_name_is_unknown() {
        let chain = SimulatedChain::new(addr(1));
        let err = chain.contract_factory(" ", &LinkTable::new()).await.unwrap_err();
        assert!(matches!(err, ChainError::UnknownContract(_)));
    }

    #[tokio::test]
    async fn missing_link_is_reported() {
        let chain = SimulatedChain::new(addr(1)).require_link("Strategy", "MathLib");
        let err = chain.contract_factory("Strategy", &LinkTable::new()).await.unwrap_err();
        assert!(matches!(err, ChainError::MissingLink { .. }));

        let mut links = LinkTable::new();
        links.insert("MathLib".to_string(), addr(9));
        assert!(chain.contract_factory("Strategy", &links).await.is_ok());
    }

    #[tokio::test]
    async fn injected_failures_count_attempts() {
        let chain = SimulatedChain::new(addr(1));
        let f = factory(&chain, "MathLib").await;
        chain.fail_next(SimOp::Deploy, 2);

        assert!(chain.deploy(&f, &[]).await.is_err());
        assert!(chain.deploy(&f, &[]).await.is_err());
        assert!(chain.deploy(&f, &[]).await.is_ok());
        assert_eq!(chain.attempts(SimOp::Deploy), 3);
        assert_eq!(chain.count(SimOp::Deploy), 1);
    }

    #[tokio::test]
    async fn ownership_transfer_requires_owner() {
        let deployer = addr(1);
        let chain = SimulatedChain::new(deployer);
        let f = factory(&chain, "InvestmentToken").await;
        let token = chain.deploy_proxy(&f, &[AbiValue::string("T"), AbiValue::string("T")]).await.unwrap();

        let mut call = ContractCall::new(token, "transferOwnership", vec![AbiValue::Address(addr(5))]);
        chain.send(&call).await.unwrap();
        assert_eq!(chain.owner_of(token), Some(addr(5)));

        call.args = vec![AbiValue::Address(addr(6))];
        assert!(matches!(chain.send(&call).await, Err(ChainError::Reverted(_))));
    }

    #[tokio::test]
    async fn deposit_and_withdraw_mint_and_burn_shares() {
        let deployer = addr(1);
        let usdc = addr(0xaa);
        let chain = SimulatedChain::new(deployer).with_token_decimals(usdc, 6);
        let token_factory = factory(&chain, "InvestmentToken").await;
        let share = chain.deploy_proxy(&token_factory, &[]).await.unwrap();
        let vault_factory = factory(&chain, "Strategy").await;
        let vault = chain
            .deploy_proxy(
                &vault_factory,
                &[AbiValue::Tuple(vec![AbiValue::Address(share), AbiValue::Address(usdc)])],
            )
            .await
            .unwrap();

        let decimals = chain.read(&ContractCall::new(usdc, "decimals", vec![])).await.unwrap();
        assert_eq!(decimals, AbiValue::uint(6));

        let deposit = ContractCall::new(vault, "deposit", vec![AbiValue::uint(1_000)]);
        assert!(chain.send(&deposit).await.is_err());

        chain
            .send(&ContractCall::new(usdc, "approve", vec![AbiValue::Address(vault), AbiValue::uint(1_000)]))
            .await
            .unwrap();
        chain.send(&deposit).await.unwrap();
        assert_eq!(chain.balance_of(share, deployer), 1_000);

        chain
            .send(&ContractCall::new(vault, "withdraw", vec![AbiValue::uint(400)]))
            .await
            .unwrap();
        assert_eq!(chain.balance_of(share, deployer), 600);
        assert_eq!(chain.balance_of(usdc, vault), 600);
    }

    #[tokio::test]
    async fn upgrade_checks_signer_and_swaps_implementation() {
        let multisig = addr(7);
        let chain = SimulatedChain::new(addr(1)).with_fork(true);
        let proxy = addr(0x77);
        chain.install_proxy(proxy, multisig);
        let before = chain.implementation_of(proxy).unwrap();
        assert_eq!(chain.contract_name_at(proxy).as_deref(), Some(RESTORED_CONTRACT));
        let f = factory(&chain, "StrategyV2").await;

        let wrong = chain.impersonate(addr(8)).await.unwrap();
        assert!(chain.upgrade_proxy(proxy, &f, None, &wrong).await.is_err());

        let signer = chain.impersonate(multisig).await.unwrap();
        let call = PostUpgradeCall {
            function_name: "initializeV2".to_string(),
            args: vec![AbiValue::uint(1)],
        };
        let after = chain.upgrade_proxy(proxy, &f, Some(&call), &signer).await.unwrap();
        assert_ne!(before, after);
        assert_eq!(chain.implementation_of(proxy), Some(after));
        assert_eq!(chain.contract_name_at(proxy).as_deref(), Some("StrategyV2"));
        assert_eq!(chain.contract_name_at(after).as_deref(), Some("StrategyV2"));
        assert_eq!(chain.tx_labels(), vec!["StrategyV2+initializeV2".to_string()]);
    }

    #[tokio::test]
    async fn impersonation_needs_fork_mode() {
        let chain = SimulatedChain::new(addr(1));
        assert!(matches!(chain.impersonate(addr(2)).await, Err(ChainError::Signer(_))));
    }

    #[tokio::test]
    async fn encode_call_is_stable() {
        let chain = SimulatedChain::new(addr(1));
        let f = factory(&chain, "StrategyV2").await;
        let a = chain.encode_call(&f, "initializeV2", &[AbiValue::uint(1)]).unwrap();
        let b = chain.encode_call(&f, "initializeV2", &[AbiValue::uint(1)]).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_ne!(a, chain.encode_call(&f, "initializeV2", &[AbiValue::uint(2)]).unwrap());
    }

    #[tokio::test]
    async fn explorer_verifies_once_then_reports_already_verified() {
        let explorer = SimulatedExplorer::new();
        let request = VerifyRequest {
            network: "base".to_string(),
            address: addr(3),
            contract_name: Some("MathLib".to_string()),
        };
        assert_eq!(explorer.verify(&request).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(explorer.verify(&request).await.unwrap(), VerifyOutcome::AlreadyVerified);
        assert_eq!(explorer.contract_name(addr(3)).as_deref(), Some("MathLib"));

        explorer.set_failing(true);
        assert!(explorer.verify(&request).await.is_err());
        assert_eq!(explorer.verified(), vec![addr(3)]);
    }
}
