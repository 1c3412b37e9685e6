//! Filesystem backend: one JSON file per live record.
//!
//! Layout is `<root>/<network>/<kind>/<name>.json`. Files are written with
//! stable pretty formatting and a trailing newline so they diff cleanly when
//! the live tree is committed alongside descriptors.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use vault_core::{InvestableKey, Kind};

use crate::error::{StateError, StateResult};
use crate::store::LiveStore;
use crate::types::LiveRecord;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

#[derive(Debug, Clone)]
pub struct FsLiveStore {
    root: PathBuf,
}

impl FsLiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Deterministic location of the record for `key`.
    pub fn path_for(&self, key: &InvestableKey) -> PathBuf {
        self.root
            .join(key.network())
            .join(key.kind().as_str())
            .join(format!("{}.json", key.name()))
    }

    fn read_record(path: &Path) -> StateResult<LiveRecord> {
        let content = fs::read_to_string(path).map_err(map_err!(Read))?;
        serde_json::from_str(&content).map_err(map_err!(Deserialize))
    }
}

impl LiveStore for FsLiveStore {
    fn get(&self, key: &InvestableKey) -> StateResult<LiveRecord> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(StateError::NotFound(key.to_string()));
        }
        Self::read_record(&path)
    }

    fn put(&self, key: &InvestableKey, record: &LiveRecord) -> StateResult<()> {
        let path = self.path_for(key);
        let dir = path
            .parent()
            .ok_or_else(|| StateError::Write(format!("no parent directory for {}", path.display())))?;
        fs::create_dir_all(dir).map_err(map_err!(Write))?;

        let mut body = serde_json::to_string_pretty(record).map_err(map_err!(Serialize))?;
        body.push('\n');

        // Write-then-rename so a crash never leaves a truncated record behind.
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(map_err!(Write))?;
            file.write_all(body.as_bytes()).map_err(map_err!(Write))?;
            file.sync_all().map_err(map_err!(Write))?;
        }
        fs::rename(&tmp, &path).map_err(map_err!(Write))?;

        debug!(%key, path = %path.display(), "live record written");
        Ok(())
    }

    fn list(&self, network: &str, kind: Option<Kind>) -> StateResult<Vec<(InvestableKey, LiveRecord)>> {
        let kinds: Vec<Kind> = match kind {
            Some(k) => vec![k],
            None => Kind::ALL.to_vec(),
        };

        let mut results = Vec::new();
        for kind in kinds {
            let dir = self.root.join(network).join(kind.as_str());
            if !dir.is_dir() {
                continue;
            }
            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
                .map_err(map_err!(Read))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();

            for path in paths {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let key = InvestableKey::new(network, kind, name)?;
                results.push((key, Self::read_record(&path)?));
            }
        }
        Ok(results)
    }
}
