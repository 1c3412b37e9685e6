use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use vault_chain::FileProposalService;
use vault_core::Kind;
use vault_upgrade::{UpgradeMode, UpgradeProposer, UpgradeReport, UpgradeState};

use super::{load_config, Session};

pub async fn upgrade(config: &Path, network: &str, kind: Kind, name: &str) -> Result<()> {
    let config = load_config(config)?;
    let descriptor = config.upgrade_descriptor_path(network, kind, name);
    let mode = UpgradeMode::from(&config.network(network));

    let proposals = FileProposalService::new(config.proposals_dir(network).join("rehearsal")).rehearsal();

    let session = Session::open(&config, network)?;
    let report = UpgradeProposer::new(session.ctx, Arc::new(proposals), mode)
        .run(&descriptor)
        .await
        .with_context(|| format!("upgrading {kind}/{name} from {}", descriptor.display()))?;

    print_report(&report, mode);
    Ok(())
}

fn print_report(report: &UpgradeReport, mode: UpgradeMode) {
    println!("Rehearsed upgrades on {} ({mode:?}), live state unchanged", report.network);
    for upgrade in &report.upgrades {
        let detail = match &upgrade.state {
            UpgradeState::Proposed { url, .. } => url.clone(),
            state => state
                .implementation()
                .map(|a| a.to_string())
                .unwrap_or_default(),
        };
        println!(
            "  {:<40} {:<18} {} {}",
            upgrade.key.to_string(),
            upgrade.state.name(),
            upgrade.contract_name,
            detail
        );
    }
    let v = &report.verification;
    println!(
        "Verification: {} verified, {} already verified, {} skipped, {} failed",
        v.verified, v.already_verified, v.skipped, v.failed
    );
}
