use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use vault_chain::{
    ChainError, ChainResult, FileProposalService, Proposal, ProposalMetadata, ProposalRequest, ProposalService,
    SimOp, SimulatedChain, SimulatedExplorer,
};
use vault_core::{Address, InvestableKey, Kind};
use vault_deploy::{DeployContext, RetryPolicy};
use vault_state::{LiveRecord, LiveStore, MemoryLiveStore};
use vault_upgrade::{UpgradeError, UpgradeMode, UpgradeProposer, UpgradeState};

const DEPLOYER: Address = Address::from_bytes([0x11; 20]);
const OWNER: Address = Address::from_bytes([0xaa; 20]);
const SAFE: Address = Address::from_bytes([0xbb; 20]);

struct Harness {
    chain: Arc<SimulatedChain>,
    store: Arc<MemoryLiveStore>,
    explorer: Arc<SimulatedExplorer>,
    proxy: Address,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(fork: bool, owner: Option<Address>, multisig: Option<Address>) -> Self {
        let chain = Arc::new(SimulatedChain::new(DEPLOYER).with_fork(fork));
        let authority = multisig.or(owner).unwrap_or(DEPLOYER);
        let proxy = Address::from_bytes([0x77; 20]);
        chain.install_proxy(proxy, authority);
        let store = Arc::new(MemoryLiveStore::new());
        let key = InvestableKey::new("base", Kind::Strategy, "Alpha").unwrap();
        store
            .put(
                &key,
                &LiveRecord {
                    name: "Alpha".to_string(),
                    address: proxy,
                    owner,
                    multisig,
                },
            )
            .unwrap();
        Self {
            chain,
            store,
            explorer: Arc::new(SimulatedExplorer::new()),
            proxy,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn context(&self) -> DeployContext {
        DeployContext::new("base", self.chain.clone(), self.store.clone(), self.explorer.clone())
            .with_retry(RetryPolicy::new(Duration::from_millis(1)))
    }

    fn proposals_dir(&self) -> PathBuf {
        self.dir.path().join("proposals")
    }

    fn proposer(&self, mode: UpgradeMode) -> UpgradeProposer {
        let proposals = Arc::new(FileProposalService::new(self.proposals_dir()));
        UpgradeProposer::new(self.context(), proposals, mode)
    }

    fn descriptor(&self, unit: Value) -> PathBuf {
        write_descriptor(self.dir.path(), unit)
    }
}

fn write_descriptor(dir: &Path, unit: Value) -> PathBuf {
    let path = dir.join("upgrade.json");
    let doc = json!({ "properties": { "alpha": unit } });
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    path
}

fn unit_with_call(proxy: &str) -> Value {
    json!({
        "proxy": proxy,
        "newImplementation": "CompoundStrategyV2",
        "functionName": "initializeV2",
        "functionArgs": [{ "type": "uint", "value": "2" }],
        "libraries": { "names": ["MathLib"] }
    })
}

#[tokio::test]
async fn fork_upgrade_uses_multisig_and_bundles_call() {
    let h = Harness::new(true, Some(OWNER), Some(SAFE));
    let before = h.chain.implementation_of(h.proxy).unwrap();

    let report = h
        .proposer(UpgradeMode::Fork)
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap();

    let upgrade = &report.upgrades[0];
    let after = h.chain.implementation_of(h.proxy).unwrap();
    assert_ne!(before, after);
    assert_eq!(upgrade.state, UpgradeState::Verified { implementation: after });

    let tx = h
        .chain
        .transactions()
        .into_iter()
        .find(|tx| tx.op == SimOp::UpgradeProxy)
        .unwrap();
    assert_eq!(tx.label, "CompoundStrategyV2+initializeV2");
    assert_eq!(tx.from, SAFE);
    assert_eq!(h.chain.tx_labels()[0], "MathLib");
    // The library is queued, the implementation verified inline.
    assert_eq!(report.verification.verified, 2);
}

#[tokio::test]
async fn production_upgrade_creates_proposal() {
    let h = Harness::new(false, Some(OWNER), None);
    let before = h.chain.implementation_of(h.proxy).unwrap();

    let report = h
        .proposer(UpgradeMode::Production)
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap();

    let UpgradeState::Proposed { url, proposal_id, implementation } = &report.upgrades[0].state else {
        panic!("expected a proposal, got {:?}", report.upgrades[0].state);
    };
    assert!(url.starts_with("file://"));
    assert_eq!(h.chain.implementation_of(h.proxy), Some(before));
    assert_eq!(h.chain.count(SimOp::UpgradeProxy), 0);
    assert_eq!(h.chain.count(SimOp::PrepareUpgrade), 1);
    assert!(h.explorer.verified().contains(implementation));

    let doc: Value = serde_json::from_str(
        &std::fs::read_to_string(h.proposals_dir().join(format!("{proposal_id}.json"))).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["via"], OWNER.to_string());
    assert!(doc["callData"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn missing_authority_fails_before_any_deployment() {
    let h = Harness::new(false, None, None);

    let err = h
        .proposer(UpgradeMode::Production)
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap_err();

    assert!(matches!(err, UpgradeError::NoAuthorizedSigner { .. }));
    assert!(h.chain.transactions().is_empty());
    assert!(!h.proposals_dir().exists());
}

#[tokio::test]
async fn half_specified_call_is_dropped() {
    let h = Harness::new(true, Some(OWNER), None);
    let unit = json!({
        "proxy": "strategy/Alpha",
        "newImplementation": "CompoundStrategyV2",
        "functionName": "initializeV2"
    });

    h.proposer(UpgradeMode::Fork).run(&h.descriptor(unit)).await.unwrap();

    assert_eq!(h.chain.tx_labels(), vec!["CompoundStrategyV2"]);
}

#[tokio::test]
async fn literal_proxy_address_is_matched_in_live_state() {
    let h = Harness::new(true, Some(OWNER), None);
    let unit = json!({ "proxy": h.proxy.to_string(), "newImplementation": "CompoundStrategyV2" });

    let report = h.proposer(UpgradeMode::Fork).run(&h.descriptor(unit)).await.unwrap();
    assert_eq!(report.upgrades[0].key.to_string(), "base/strategy/Alpha");

    let unknown = json!({
        "proxy": "0x00000000000000000000000000000000000000ee",
        "newImplementation": "CompoundStrategyV2"
    });
    let err = h.proposer(UpgradeMode::Fork).run(&h.descriptor(unknown)).await.unwrap_err();
    assert!(matches!(err, UpgradeError::ProxyNotFound(_)));
}

#[tokio::test]
async fn fork_mode_on_a_live_network_deploys_nothing() {
    let h = Harness::new(false, Some(OWNER), None);

    let err = h
        .proposer(UpgradeMode::Fork)
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap_err();

    assert!(matches!(err, UpgradeError::Chain(ChainError::Signer(_))));
    assert!(h.chain.transactions().is_empty());
}

/// Multisig backend that does not echo the implementation address.
struct OpaqueProposals;

#[async_trait]
impl ProposalService for OpaqueProposals {
    async fn create_proposal(&self, _request: &ProposalRequest) -> ChainResult<Proposal> {
        Ok(Proposal {
            url: "https://safe.example/tx/42".to_string(),
            metadata: ProposalMetadata {
                proposal_id: "42".to_string(),
                new_implementation_address: None,
            },
        })
    }
}

#[tokio::test]
async fn proposal_without_implementation_skips_verification() {
    let h = Harness::new(false, None, Some(SAFE));
    let proposer = UpgradeProposer::new(h.context(), Arc::new(OpaqueProposals), UpgradeMode::Production);

    let report = proposer
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap();

    let implementation = report.upgrades[0].state.implementation().unwrap();
    assert_eq!(report.upgrades[0].state.name(), "proposed");
    assert!(!h.explorer.verified().contains(&implementation));
    // Only the library deployed on the way was verified.
    assert_eq!(report.verification.verified, 1);
    assert_eq!(h.explorer.verified().len(), 1);
}

#[tokio::test]
async fn listed_libraries_are_redeployed_for_the_new_implementation() {
    let h = Harness::new(true, Some(OWNER), None);
    let math = InvestableKey::new("base", Kind::Library, "MathLib").unwrap();
    let old = Address::from_bytes([0x42; 20]);
    h.store.put(&math, &LiveRecord::new("MathLib", old)).unwrap();

    h.proposer(UpgradeMode::Fork)
        .run(&h.descriptor(unit_with_call("strategy/Alpha")))
        .await
        .unwrap();

    assert_eq!(h.chain.count(SimOp::Deploy), 1);
    let fresh = h.store.get(&math).unwrap().address;
    assert_ne!(fresh, old);
    let upgrade = h
        .chain
        .transactions()
        .into_iter()
        .find(|tx| tx.op == SimOp::UpgradeProxy)
        .unwrap();
    assert_eq!(upgrade.label, "CompoundStrategyV2+initializeV2");
}
