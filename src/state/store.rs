//! Snapshot stores with optimistic concurrency
//!
//! Every save names the version the caller read. A store rejects the save
//! with `VersionConflict` when its current version differs, so two writers
//! that loaded the same snapshot can never both win. A saved snapshot must
//! also carry a revision above the stored version; content is never replaced
//! in place.

use super::snapshot::Snapshot;
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A snapshot together with the store version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub snapshot: Snapshot,
    pub version: u64,
}

/// Persistence for one snapshot per configuration item
///
/// An absent entry has version `0`.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, ci_reference: &str) -> EngineResult<StoredSnapshot>;

    /// Compare-and-set; returns the new version
    fn save(
        &self,
        ci_reference: &str,
        snapshot: &Snapshot,
        expected_version: u64,
    ) -> EngineResult<u64>;

    /// Current version, `0` if nothing is stored
    fn version(&self, ci_reference: &str) -> EngineResult<u64>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn load(&self, ci_reference: &str) -> EngineResult<StoredSnapshot> {
        (**self).load(ci_reference)
    }

    fn save(&self, ci_reference: &str, snapshot: &Snapshot, expected_version: u64) -> EngineResult<u64> {
        (**self).save(ci_reference, snapshot, expected_version)
    }

    fn version(&self, ci_reference: &str) -> EngineResult<u64> {
        (**self).version(ci_reference)
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Box<T> {
    fn load(&self, ci_reference: &str) -> EngineResult<StoredSnapshot> {
        (**self).load(ci_reference)
    }

    fn save(&self, ci_reference: &str, snapshot: &Snapshot, expected_version: u64) -> EngineResult<u64> {
        (**self).save(ci_reference, snapshot, expected_version)
    }

    fn version(&self, ci_reference: &str) -> EngineResult<u64> {
        (**self).version(ci_reference)
    }
}

/// Shared compare-and-set rule for every store
fn check_save(
    ci_reference: &str,
    snapshot: &Snapshot,
    current: u64,
    expected: u64,
) -> EngineResult<u64> {
    if expected != current {
        tracing::warn!(
            ci = ci_reference,
            expected,
            actual = current,
            revision = snapshot.revision,
            "snapshot version conflict"
        );
        return Err(EngineError::VersionConflict {
            ci: ci_reference.to_string(),
            expected,
            actual: current,
        });
    }
    if snapshot.revision <= current {
        tracing::warn!(ci = ci_reference, current, revision = snapshot.revision, "stale snapshot revision");
        return Err(EngineError::InvariantViolation(format!(
            "snapshot revision {} for '{}' does not advance stored version {}",
            snapshot.revision, ci_reference, current
        )));
    }
    Ok(snapshot.revision)
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, ci_reference: &str) -> EngineResult<StoredSnapshot> {
        self.entries
            .lock()
            .get(ci_reference)
            .cloned()
            .ok_or_else(|| EngineError::SnapshotNotFound(ci_reference.to_string()))
    }

    fn save(&self, ci_reference: &str, snapshot: &Snapshot, expected_version: u64) -> EngineResult<u64> {
        let mut entries = self.entries.lock();
        let current = entries.get(ci_reference).map_or(0, |e| e.version);
        let version = check_save(ci_reference, snapshot, current, expected_version)?;

        entries.insert(
            ci_reference.to_string(),
            StoredSnapshot {
                snapshot: snapshot.clone(),
                version,
            },
        );
        Ok(version)
    }

    fn version(&self, ci_reference: &str) -> EngineResult<u64> {
        Ok(self.entries.lock().get(ci_reference).map_or(0, |e| e.version))
    }
}

// =============================================================================
// File store
// =============================================================================

/// One `<ci>.snapshot.json` per item under a state directory
///
/// Check-and-write runs while holding `<ci>.lock`, created exclusively. The
/// snapshot file itself is replaced atomically.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, ci_reference: &str) -> PathBuf {
        self.dir.join(format!("{}.snapshot.json", file_stem(ci_reference)))
    }

    fn lock_path(&self, ci_reference: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", file_stem(ci_reference)))
    }

    fn read(&self, ci_reference: &str) -> EngineResult<Option<Snapshot>> {
        let path = self.snapshot_path(ci_reference);
        match std::fs::read_to_string(&path) {
            Ok(content) => Snapshot::decode(&content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, ci_reference: &str, snapshot: &Snapshot) -> EngineResult<()> {
        let content = snapshot.encode()?;
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(self.snapshot_path(ci_reference))
            .map_err(|e| EngineError::Io(e.error))?;
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, ci_reference: &str) -> EngineResult<StoredSnapshot> {
        let snapshot = self
            .read(ci_reference)?
            .ok_or_else(|| EngineError::SnapshotNotFound(ci_reference.to_string()))?;
        let version = snapshot.version();
        Ok(StoredSnapshot { snapshot, version })
    }

    fn save(&self, ci_reference: &str, snapshot: &Snapshot, expected_version: u64) -> EngineResult<u64> {
        std::fs::create_dir_all(&self.dir)?;
        let _lock = LockFile::acquire(self.lock_path(ci_reference), ci_reference)?;

        let current = self.read(ci_reference)?.map_or(0, |s| s.version());
        let version = check_save(ci_reference, snapshot, current, expected_version)?;
        self.write(ci_reference, snapshot)?;

        tracing::info!(ci = ci_reference, version, "snapshot saved");
        Ok(version)
    }

    fn version(&self, ci_reference: &str) -> EngineResult<u64> {
        Ok(self.read(ci_reference)?.map_or(0, |s| s.version()))
    }
}

/// Exclusive lock file, removed on drop
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf, ci_reference: &str) -> EngineResult<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(ci = ci_reference, lock = %path.display(), "lock held");
                Err(EngineError::StoreBusy(ci_reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// File-name-safe stem for a CI reference
///
/// References that need rewriting get a short hash suffix so that two
/// distinct references never share a file.
fn file_stem(ci_reference: &str) -> String {
    let safe: String = ci_reference
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == ci_reference && !safe.is_empty() {
        return safe;
    }

    let mut hasher = Sha256::new();
    hasher.update(ci_reference.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", safe, &digest[..12])
}
