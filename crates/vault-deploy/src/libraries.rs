//! Library deployment in descriptor order.

use tracing::{debug, info};
use vault_core::{Address, Kind, LibraryRef, LinkTable};
use vault_state::LiveRecord;

use crate::context::{DeployContext, RedeployPolicy};
use crate::error::{DeployError, DeployResult};

/// Deploys libraries for one run.
///
/// Keep a single deployer per run: a library deployed earlier in the run is
/// reused by every later unit, even when the run is forced.
pub struct LibraryDeployer<'a> {
    ctx: &'a DeployContext,
    run: LinkTable,
}

impl<'a> LibraryDeployer<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self {
            ctx,
            run: LinkTable::new(),
        }
    }

    /// Every library deployed or reused so far in this run.
    pub fn linked(&self) -> &LinkTable {
        &self.run
    }

    /// Deploy `libraries` in order and return `name → address` for each.
    ///
    /// Every dependency must already have a library record, either from an
    /// earlier run or from an earlier entry of this list. A library whose
    /// record exists is reused unless the run is forced.
    pub async fn deploy_all(&mut self, libraries: &[LibraryRef]) -> DeployResult<LinkTable> {
        let mut deployed = LinkTable::new();
        for library in libraries {
            let address = self
                .deploy_one(&library.name, &library.name, &library.dependencies)
                .await?;
            deployed.insert(library.name.clone(), address);
        }
        Ok(deployed)
    }

    /// Deploy one library contract under `name`, linking `dependencies`.
    pub async fn deploy_one(
        &mut self,
        name: &str,
        contract_name: &str,
        dependencies: &[String],
    ) -> DeployResult<Address> {
        let key = self.ctx.key(Kind::Library, name)?;
        if let Some(address) = self.run.get(name) {
            debug!(%key, %address, "library deployed earlier in this run, reusing");
            return Ok(*address);
        }
        if self.ctx.redeploy == RedeployPolicy::Reject {
            if let Some(existing) = self.ctx.store.find(&key)? {
                info!(%key, address = %existing.address, "library already deployed, reusing");
                self.run.insert(name.to_string(), existing.address);
                return Ok(existing.address);
            }
        }

        let links = self.resolve_links(name, dependencies)?;
        let chain = self.ctx.chain.as_ref();
        let factory = chain.contract_factory(contract_name, &links).await?;
        let step = format!("deploy library {name}");
        let address = self.ctx.retry(&step, || chain.deploy(&factory, &[])).await?;

        self.ctx.store.put(&key, &LiveRecord::new(name, address))?;
        self.ctx.verification.submit(address, Some(contract_name)).await;
        self.run.insert(name.to_string(), address);
        info!(%key, %address, links = links.len(), "library deployed");
        Ok(address)
    }

    fn resolve_links(&self, library: &str, dependencies: &[String]) -> DeployResult<LinkTable> {
        let mut links = LinkTable::new();
        for dependency in dependencies {
            if let Some(address) = self.run.get(dependency) {
                links.insert(dependency.clone(), *address);
                continue;
            }
            let key = self.ctx.key(Kind::Library, dependency)?;
            let record = self.ctx.store.find(&key)?.ok_or_else(|| DeployError::UnresolvedDependency {
                library: library.to_string(),
                dependency: dependency.clone(),
            })?;
            debug!(library, dependency = %dependency, address = %record.address, "link resolved");
            links.insert(dependency.clone(), record.address);
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use vault_chain::{SimOp, SimulatedChain, SimulatedExplorer};
    use vault_core::InvestableKey;
    use vault_state::{LiveStore, MemoryLiveStore};

    use crate::retry::RetryPolicy;

    fn lib(name: &str, deps: &[&str]) -> LibraryRef {
        LibraryRef {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn setup() -> (Arc<SimulatedChain>, Arc<MemoryLiveStore>, DeployContext) {
        setup_with(SimulatedChain::new(Address::from_bytes([1u8; 20])))
    }

    fn setup_with(chain: SimulatedChain) -> (Arc<SimulatedChain>, Arc<MemoryLiveStore>, DeployContext) {
        let chain = Arc::new(chain);
        let store = Arc::new(MemoryLiveStore::new());
        let ctx = DeployContext::new("base", chain.clone(), store.clone(), Arc::new(SimulatedExplorer::new()))
            .with_retry(RetryPolicy::new(Duration::from_millis(1)));
        (chain, store, ctx)
    }

    #[tokio::test]
    async fn empty_list_touches_nothing() {
        let (chain, store, ctx) = setup();
        let links = LibraryDeployer::new(&ctx)
            .deploy_all(&[]).await.unwrap();
        assert!(links.is_empty());
        assert!(chain.transactions().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn deploys_in_order_and_links_earlier_entries() {
        let (_chain, store, ctx) =
            setup_with(SimulatedChain::new(Address::from_bytes([1u8; 20])).require_link("FeeLib", "MathLib"));

        let links = LibraryDeployer::new(&ctx)
            .deploy_all(&[lib("MathLib", &[]), lib("FeeLib", &["MathLib"])])
            .await
            .unwrap();

        assert_eq!(links.len(), 2);
        let key = InvestableKey::new("base", Kind::Library, "FeeLib").unwrap();
        assert_eq!(store.get(&key).unwrap().address, links["FeeLib"]);
    }

    #[tokio::test]
    async fn missing_dependency_fails_before_deploying() {
        let (chain, _store, ctx) = setup();
        let err = LibraryDeployer::new(&ctx)
            .deploy_all(&[lib("MathLib", &[]), lib("FeeLib", &["OracleLib"])])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::UnresolvedDependency { ref library, ref dependency }
                if library == "FeeLib" && dependency == "OracleLib"
        ));
        assert_eq!(chain.tx_labels(), vec!["MathLib".to_string()]);
    }

    #[tokio::test]
    async fn existing_library_is_reused_unless_forced() {
        let (chain, store, ctx) = setup();
        let key = InvestableKey::new("base", Kind::Library, "MathLib").unwrap();
        let existing = Address::from_bytes([9u8; 20]);
        store.put(&key, &LiveRecord::new("MathLib", existing)).unwrap();

        let links = LibraryDeployer::new(&ctx)
            .deploy_all(&[lib("MathLib", &[])]).await.unwrap();
        assert_eq!(links["MathLib"], existing);
        assert_eq!(chain.count(SimOp::Deploy), 0);

        let forced = ctx.clone().with_redeploy(RedeployPolicy::Force);
        let links = LibraryDeployer::new(&forced)
            .deploy_all(&[lib("MathLib", &[])]).await.unwrap();
        assert_ne!(links["MathLib"], existing);
        assert_eq!(store.get(&key).unwrap().address, links["MathLib"]);
    }

    #[tokio::test]
    async fn transient_deploy_failures_are_retried() {
        let (chain, _store, ctx) = setup();
        chain.fail_next(SimOp::Deploy, 2);
        let links = LibraryDeployer::new(&ctx)
            .deploy_all(&[lib("MathLib", &[])]).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(chain.attempts(SimOp::Deploy), 3);
    }

    #[tokio::test]
    async fn forced_run_deploys_each_library_once() {
        let (chain, store, ctx) = setup();
        let forced = ctx.with_redeploy(RedeployPolicy::Force);
        let libraries = [lib("MathLib", &[]), lib("SwapLib", &["MathLib"])];

        let mut deployer = LibraryDeployer::new(&forced);
        let first = deployer.deploy_all(&libraries).await.unwrap();
        let second = deployer.deploy_all(&libraries).await.unwrap();
        let third = deployer.deploy_all(&libraries).await.unwrap();

        assert_eq!(chain.count(SimOp::Deploy), 2);
        assert_eq!(first, second);
        assert_eq!(second, third);
        let key = InvestableKey::new("base", Kind::Library, "MathLib").unwrap();
        assert_eq!(store.get(&key).unwrap().address, first["MathLib"]);
        assert_eq!(deployer.linked().len(), 2);
    }
}
