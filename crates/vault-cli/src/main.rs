use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vault_core::Kind;

mod commands;

#[derive(Parser)]
#[command(
    name = "vault",
    about = "vaultgrid: deploy and upgrade on-chain investables from descriptors",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Settings file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "vault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the unit `<kind>/<name>` and everything its descriptor lists
    /// before it.
    ///
    /// The descriptor is read from `<deploy_root>/<network>/<kind>/<name>.json`.
    Deploy {
        network: String,
        kind: Kind,
        name: String,
        /// Redeploy components that already have a live record.
        #[arg(long)]
        force: bool,
        /// Do not run the deposit/withdraw smoke test afterwards.
        #[arg(long)]
        skip_smoke: bool,
    },
    /// Upgrade proxies listed in `<upgrade_root>/<network>/<kind>/<name>.json`.
    ///
    /// Fork networks are upgraded directly; others get a multisig proposal.
    Upgrade {
        network: String,
        kind: Kind,
        name: String,
    },
    /// List live records for a network.
    Live {
        network: String,
        #[arg(short, long)]
        kind: Option<Kind>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { network, kind, name, force, skip_smoke } => {
            commands::deploy::deploy(&cli.config, &network, kind, &name, force, skip_smoke).await
        }
        Commands::Upgrade { network, kind, name } => {
            commands::upgrade::upgrade(&cli.config, &network, kind, &name).await
        }
        Commands::Live { network, kind, json } => {
            commands::live::live(&cli.config, &network, kind, json)
        }
    }
}
