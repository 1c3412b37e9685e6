use std::path::Path;

use anyhow::{Context, Result};
use vault_core::Kind;
use vault_deploy::{DeployPipeline, DeployRequest, DeploymentReport, RedeployPolicy, SmokeOutcome};

use super::{load_config, Session};

pub async fn deploy(config: &Path, network: &str, kind: Kind, name: &str, force: bool, skip_smoke: bool) -> Result<()> {
    let config = load_config(config)?;
    let descriptor = config.deploy_descriptor_path(network, kind, name);
    let session = Session::open(&config, network)?;
    let redeploy = if force { RedeployPolicy::Force } else { RedeployPolicy::Reject };
    let ctx = session.ctx.with_redeploy(redeploy);

    let request = DeployRequest {
        descriptor: descriptor.clone(),
        kind,
        name: name.to_string(),
        skip_smoke,
    };
    let report = DeployPipeline::new(ctx, config.smoke.clone())
        .run(&request)
        .await
        .with_context(|| format!("deploying {kind}/{name} from {}", descriptor.display()))?;

    print_report(&report, session.chain.transactions().len());
    Ok(())
}

fn print_report(report: &DeploymentReport, transactions: usize) {
    println!(
        "Rehearsed deployment to {} ({transactions} simulated transactions), live state unchanged",
        report.network
    );
    for (key, record) in &report.deployed {
        println!("  {:<40} {}", key.to_string(), record.address);
    }
    if !report.libraries.is_empty() {
        println!("Libraries:");
        for (name, address) in &report.libraries {
            println!("  {name:<40} {address}");
        }
    }
    match &report.smoke {
        SmokeOutcome::Passed(smoke) => println!(
            "Smoke: deposited {}, received {} shares, withdrew {}",
            smoke.deposited, smoke.shares_received, smoke.withdrawn
        ),
        SmokeOutcome::Failed(reason) => println!("Smoke: FAILED ({reason})"),
        SmokeOutcome::Skipped => println!("Smoke: skipped"),
    }
    let v = &report.verification;
    println!(
        "Verification: {} verified, {} already verified, {} skipped, {} failed",
        v.verified, v.already_verified, v.skipped, v.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_workspace(root: &Path) -> std::path::PathBuf {
        let descriptor = json!({
            "properties": {
                "alpha": {
                    "name": "Alpha",
                    "contractName": "CompoundStrategy",
                    "kind": "strategy",
                    "owner": "0x00000000000000000000000000000000000000aa",
                    "depositToken": "0x00000000000000000000000000000000000000c0",
                    "tokenArgs": { "name": "Alpha Share", "symbol": "aSHR" }
                }
            }
        });
        let descriptor_dir = root.join("deploy/base/strategy");
        std::fs::create_dir_all(&descriptor_dir).unwrap();
        std::fs::write(descriptor_dir.join("Alpha.json"), descriptor.to_string()).unwrap();

        let config_path = root.join("vault.toml");
        let settings = format!(
            "[paths]\nlive_root = {:?}\ndeploy_root = {:?}\n\n[retry]\ndelay_ms = 1\n",
            root.join("live").display().to_string(),
            root.join("deploy").display().to_string(),
        );
        std::fs::write(&config_path, settings).unwrap();
        config_path
    }

    #[tokio::test]
    async fn rehearsal_leaves_live_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());

        deploy(&config_path, "base", Kind::Strategy, "Alpha", false, false)
            .await
            .unwrap();
        assert!(!dir.path().join("live/base/strategy/Alpha.json").exists());

        // Nothing was recorded, so a second run is not a redeploy.
        deploy(&config_path, "base", Kind::Strategy, "Alpha", false, true)
            .await
            .unwrap();
    }
}
