//! Opening the configured live state backend.

use std::fs;
use std::sync::Arc;

use tracing::info;
use vault_core::config::{PathsConfig, StoreBackend};

use crate::error::{StateError, StateResult};
use crate::fs::FsLiveStore;
use crate::redb_store::RedbLiveStore;
use crate::store::LiveStore;

/// Open the backend `[paths] backend` selects.
pub fn open_live_store(paths: &PathsConfig) -> StateResult<Arc<dyn LiveStore>> {
    match paths.backend {
        StoreBackend::Fs => {
            info!(backend = "fs", root = %paths.live_root.display(), "live store opened");
            Ok(Arc::new(FsLiveStore::new(paths.live_root.clone())))
        }
        StoreBackend::Redb => {
            if let Some(parent) = paths.state_db.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| StateError::Open(e.to_string()))?;
            }
            let store = RedbLiveStore::open(&paths.state_db)?;
            info!(backend = "redb", db = %paths.state_db.display(), "live store opened");
            Ok(Arc::new(store))
        }
    }
}
