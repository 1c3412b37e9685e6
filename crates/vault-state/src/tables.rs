//! redb table definitions for the live state store.
//!
//! Keys are `{network}/{kind}/{name}`; values are JSON-serialized
//! [`LiveRecord`](crate::LiveRecord)s.

use redb::TableDefinition;

/// Live records keyed by `{network}/{kind}/{name}`.
pub const LIVE_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("live_records");
