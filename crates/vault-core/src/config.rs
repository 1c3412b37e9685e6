//! vault.toml configuration parser.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::primitives::Address;
use crate::types::Kind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub paths: PathsConfig,
    pub retry: RetryConfig,
    pub smoke: SmokeConfig,
    pub proposals: ProposalsConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the live state tree (`<live_root>/<network>/<kind>/<name>.json`).
    pub live_root: PathBuf,
    /// Root of deploy descriptors (`<deploy_root>/<network>/<kind>/<name>.json`).
    pub deploy_root: PathBuf,
    /// Root of upgrade descriptors (`<upgrade_root>/<network>/<kind>/<name>.json`).
    pub upgrade_root: PathBuf,
    /// Which backend holds live records.
    pub backend: StoreBackend,
    /// Database file of the redb backend.
    pub state_db: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON file per record under `live_root`.
    #[default]
    Fs,
    /// A single redb database at `state_db`.
    Redb,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            live_root: PathBuf::from("live"),
            deploy_root: PathBuf::from("config/deploy"),
            upgrade_root: PathBuf::from("config/upgrade"),
            backend: StoreBackend::Fs,
            state_db: PathBuf::from("live.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { delay_ms: 1000 }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeConfig {
    pub enabled: bool,
    /// Whole units of the deposit token to deposit.
    pub deposit_units: u64,
    /// Share of the received investment tokens to withdraw again.
    pub withdraw_percent: u8,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deposit_units: 10,
            withdraw_percent: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalsConfig {
    /// Directory the file-backed proposal service writes into.
    /// Defaults to `<live_root>/<network>/proposals`.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local fork or test chain: accounts can be impersonated and upgrades
    /// executed directly instead of proposed.
    pub fork: bool,
    /// Account deployments are sent from.
    pub deployer: Option<Address>,
}

impl VaultConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn network(&self, name: &str) -> NetworkConfig {
        self.networks.get(name).cloned().unwrap_or_default()
    }

    pub fn deploy_descriptor_path(&self, network: &str, kind: Kind, name: &str) -> PathBuf {
        descriptor_path(&self.paths.deploy_root, network, kind, name)
    }

    pub fn upgrade_descriptor_path(&self, network: &str, kind: Kind, name: &str) -> PathBuf {
        descriptor_path(&self.paths.upgrade_root, network, kind, name)
    }

    pub fn proposals_dir(&self, network: &str) -> PathBuf {
        self.proposals
            .output_dir
            .clone()
            .unwrap_or_else(|| self.paths.live_root.join(network).join("proposals"))
    }
}

fn descriptor_path(root: &Path, network: &str, kind: Kind, name: &str) -> PathBuf {
    root.join(network).join(kind.as_str()).join(format!("{name}.json"))
}
