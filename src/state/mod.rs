//! Snapshot persistence
//!
//! Handles the durable side of a process:
//! - Encoding state trees into checksummed, schema-versioned snapshots
//! - Version-checked snapshot stores (in memory and on disk)
//! - Sessions that load, apply and save with optimistic retries

mod session;
mod snapshot;
mod store;

pub use session::{Applied, ProcessSession, DEFAULT_MAX_ATTEMPTS};
pub use snapshot::{checksum, from_snapshot, to_snapshot, Snapshot, SCHEMA_VERSION};
pub use store::{FileStore, MemoryStore, SnapshotStore, StoredSnapshot};
