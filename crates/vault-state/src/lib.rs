//! vault-state: the live state store for vaultgrid.
//!
//! Maps `(network, kind, name)` to the [`LiveRecord`] of a deployed
//! component. Every stage of the orchestrator reads it to resolve symbolic
//! references; it is written once a deployment step has fully succeeded.
//!
//! # Backends
//!
//! - [`FsLiveStore`]: one pretty-printed JSON file per key at
//!   `<live_root>/<network>/<kind>/<name>.json`.
//! - [`RedbLiveStore`]: embedded redb database, one table keyed by
//!   `<network>/<kind>/<name>`.
//! - [`MemoryLiveStore`]: for tests and rehearsal runs.
//!
//! [`open_live_store`] opens whichever of the first two `vault.toml` selects.
//!
//! There is exactly one writer per state directory. The store does not lock
//! against concurrent orchestrator processes; callers must serialise runs
//! against the same network (for example with an external file lock).

pub mod backend;
pub mod error;
pub mod fs;
pub mod redb_store;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::open_live_store;
pub use error::{StateError, StateResult};
pub use fs::FsLiveStore;
pub use redb_store::RedbLiveStore;
pub use store::{LiveStore, MemoryLiveStore};
pub use types::LiveRecord;
