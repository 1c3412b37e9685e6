//! RedbLiveStore: redb-backed live state for operators who prefer a single
//! database file over a directory tree.
//!
//! Records are JSON-serialized into redb's `&[u8]` value column under
//! `{network}/{kind}/{name}` keys, so a network/kind prefix scan lists them.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;
use vault_core::{InvestableKey, Kind};

use crate::error::{StateError, StateResult};
use crate::store::LiveStore;
use crate::tables::LIVE_RECORDS;
use crate::types::LiveRecord;

macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe live store backed by redb.
#[derive(Clone)]
pub struct RedbLiveStore {
    db: Arc<Database>,
}

impl RedbLiveStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "live store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(LIVE_RECORDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl LiveStore for RedbLiveStore {
    fn get(&self, key: &InvestableKey) -> StateResult<LiveRecord> {
        let table_key = key.to_string();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LIVE_RECORDS).map_err(map_err!(Table))?;
        match table.get(table_key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(StateError::NotFound(table_key)),
        }
    }

    fn put(&self, key: &InvestableKey, record: &LiveRecord) -> StateResult<()> {
        let table_key = key.to_string();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LIVE_RECORDS).map_err(map_err!(Table))?;
            table
                .insert(table_key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        // Commit is durable before it returns.
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %table_key, "live record stored");
        Ok(())
    }

    fn list(&self, network: &str, kind: Option<Kind>) -> StateResult<Vec<(InvestableKey, LiveRecord)>> {
        let prefix = match kind {
            Some(k) => format!("{network}/{k}/"),
            None => format!("{network}/"),
        };
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LIVE_RECORDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (raw_key, value) = entry.map_err(map_err!(Read))?;
            let raw_key = raw_key.value();
            let Some(rest) = raw_key.strip_prefix(&prefix) else {
                continue;
            };
            let (kind, name) = match kind {
                Some(k) => (k, rest),
                None => {
                    let (kind, name) = rest
                        .split_once('/')
                        .ok_or_else(|| StateError::Read(format!("malformed key `{raw_key}`")))?;
                    (kind.parse::<Kind>()?, name)
                }
            };
            let record: LiveRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push((InvestableKey::new(network, kind, name)?, record));
        }
        Ok(results)
    }
}
