//! The `LiveStore` abstraction and its in-memory backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;
use vault_core::{InvestableKey, Kind};

use crate::error::{StateError, StateResult};
use crate::types::LiveRecord;

/// Keyed registry of deployed components.
///
/// `put` is an idempotent overwrite and must be durable before it returns.
pub trait LiveStore: Send + Sync {
    /// Fetch the record for `key`, failing with [`StateError::NotFound`].
    fn get(&self, key: &InvestableKey) -> StateResult<LiveRecord>;

    /// Insert or overwrite the record for `key`.
    fn put(&self, key: &InvestableKey, record: &LiveRecord) -> StateResult<()>;

    /// All records on `network`, optionally restricted to one kind, ordered
    /// by key.
    fn list(&self, network: &str, kind: Option<Kind>) -> StateResult<Vec<(InvestableKey, LiveRecord)>>;

    /// Like [`get`](Self::get) but maps `NotFound` to `None`.
    fn find(&self, key: &InvestableKey) -> StateResult<Option<LiveRecord>> {
        match self.get(key) {
            Ok(record) => Ok(Some(record)),
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Ephemeral store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLiveStore {
    records: RwLock<BTreeMap<InvestableKey, LiveRecord>>,
}

impl MemoryLiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LiveStore for MemoryLiveStore {
    fn get(&self, key: &InvestableKey) -> StateResult<LiveRecord> {
        let records = self
            .records
            .read()
            .map_err(|e| StateError::Read(e.to_string()))?;
        records
            .get(key)
            .cloned()
            .ok_or_else(|| StateError::NotFound(key.to_string()))
    }

    fn put(&self, key: &InvestableKey, record: &LiveRecord) -> StateResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StateError::Write(e.to_string()))?;
        records.insert(key.clone(), record.clone());
        debug!(%key, address = %record.address, "live record stored");
        Ok(())
    }

    fn list(&self, network: &str, kind: Option<Kind>) -> StateResult<Vec<(InvestableKey, LiveRecord)>> {
        let records = self
            .records
            .read()
            .map_err(|e| StateError::Read(e.to_string()))?;
        Ok(records
            .iter()
            .filter(|(key, _)| key.network() == network && kind.is_none_or(|k| key.kind() == k))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::Address;

    fn key(kind: Kind, name: &str) -> InvestableKey {
        InvestableKey::new("base", kind, name).unwrap()
    }

    fn record(name: &str, last_byte: u8) -> LiveRecord {
        let mut bytes = [0u8; 20];
        bytes[19] = last_byte;
        LiveRecord::new(name, Address::from_bytes(bytes))
    }

    #[test]
    fn put_and_get_roundtrip() {
        let store = MemoryLiveStore::new();
        let mut rec = record("Alpha", 1);
        rec.owner = Some(Address::from_bytes([7u8; 20]));

        store.put(&key(Kind::Strategy, "Alpha"), &rec).unwrap();
        assert_eq!(store.get(&key(Kind::Strategy, "Alpha")).unwrap(), rec);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = MemoryLiveStore::new();
        let err = store.get(&key(Kind::Index, "nope")).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
        assert!(store.find(&key(Kind::Index, "nope")).unwrap().is_none());
    }

    #[test]
    fn put_twice_keeps_second() {
        let store = MemoryLiveStore::new();
        store.put(&key(Kind::Portfolio, "P"), &record("P", 1)).unwrap();
        store.put(&key(Kind::Portfolio, "P"), &record("P", 2)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key(Kind::Portfolio, "P")).unwrap(), record("P", 2));
    }

    #[test]
    fn list_filters_network_and_kind() {
        let store = MemoryLiveStore::new();
        store.put(&key(Kind::Strategy, "A"), &record("A", 1)).unwrap();
        store.put(&key(Kind::Library, "L"), &record("L", 2)).unwrap();
        let other = InvestableKey::new("mainnet", Kind::Strategy, "A").unwrap();
        store.put(&other, &record("A", 3)).unwrap();

        assert_eq!(store.list("base", None).unwrap().len(), 2);
        assert_eq!(store.list("base", Some(Kind::Library)).unwrap().len(), 1);
        assert_eq!(store.list("mainnet", None).unwrap().len(), 1);
    }
}
