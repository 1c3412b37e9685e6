//! Subcommand implementations and the wiring they share.

pub mod deploy;
pub mod live;
pub mod upgrade;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vault_chain::{SimulatedChain, SimulatedExplorer};
use vault_core::{Address, VaultConfig};
use vault_deploy::{DeployContext, RetryPolicy};
use vault_state::{open_live_store, LiveStore, MemoryLiveStore};

/// Sender used when the network names no deployer.
const REHEARSAL_DEPLOYER: Address = Address::from_bytes([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xde, 0xad,
]);

pub fn load_config(path: &Path) -> Result<VaultConfig> {
    VaultConfig::load_or_default(path).with_context(|| format!("loading settings from {}", path.display()))
}

/// Everything a subcommand runs against.
pub struct Session {
    pub chain: Arc<SimulatedChain>,
    pub ctx: DeployContext,
}

impl Session {
    /// Wire chain, explorer, stores and Ctrl-C handling for `network`.
    ///
    /// Chain and explorer are the in-process simulators, so a session is a
    /// rehearsal. The configured live store is only read: its records for
    /// `network` are copied into an in-memory store the run writes to, and
    /// its investable proxies are installed in the simulator so upgrades
    /// have something to act on.
    pub fn open(config: &VaultConfig, network: &str) -> Result<Self> {
        let network_config = config.network(network);
        let deployer = network_config.deployer.unwrap_or(REHEARSAL_DEPLOYER);
        let chain = Arc::new(SimulatedChain::new(deployer).with_fork(network_config.fork));

        let live = open_live_store(&config.paths).context("opening live state")?;
        let records = live
            .list(network, None)
            .with_context(|| format!("reading live state for {network}"))?;
        let rehearsal = Arc::new(MemoryLiveStore::new());
        let mut replayed = 0;
        for (key, record) in &records {
            rehearsal.put(key, record)?;
            if key.kind().is_investable() {
                let authority = record.upgrade_authority().unwrap_or(deployer);
                chain.install_proxy(record.address, authority);
                replayed += 1;
            }
        }

        let cancel = CancellationToken::new();
        spawn_interrupt_handler(cancel.clone());

        let ctx = DeployContext::new(network, chain.clone(), rehearsal, Arc::new(SimulatedExplorer::new()))
            .with_retry(RetryPolicy::from(&config.retry))
            .with_cancel(cancel);

        info!(
            network,
            %deployer,
            fork = network_config.fork,
            records = records.len(),
            replayed,
            "rehearsal session opened"
        );
        Ok(Self { chain, ctx })
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current attempt");
            cancel.cancel();
        }
    });
}
