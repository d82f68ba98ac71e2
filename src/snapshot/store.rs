//! In-memory snapshot cache, comparison and persistence.
//!
//! Lifecycle:
//! - Records enter memory when a batch directory is first loaded (lazy,
//!   per-directory, idempotent) or when compare() runs in update mode
//!   against a missing identity.
//! - Records leave memory only at process exit; persisted writes survive.
//!
//! Concurrency: the cache is shared mutable state read and written by
//! every test body of a run. Execution is strictly sequential (the
//! orchestrator rejects overlapping runs), so there is no locking here;
//! the store is NOT safe for concurrent runs.

use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::consts::{KEY_SEPARATOR, SNAP_DEFAULT_FILE};
use crate::errors::SnapError;
use crate::metrics;
use crate::snapshot::format;

/// One recorded value, keyed by (directory, identity).
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// Full hierarchical test title; unique within a directory
    /// (collisions between identically titled tests are the caller's
    /// responsibility).
    pub identity: String,
    /// Last accepted value.
    pub value: Value,
    /// Canonical serialization of `value` (the comparison form).
    pub stored: String,
    /// Pending write not yet persisted.
    pub dirty: bool,
    /// Backing file; several records may share one file.
    pub source_file: PathBuf,
}

#[derive(Debug, Default)]
struct DirCache {
    records: HashMap<String, SnapshotRecord>,
}

/// Snapshot store: per-directory caches plus the run-scoped flags.
pub struct SnapshotStore {
    snap_root: PathBuf,
    dirs: HashMap<PathBuf, DirCache>,
    /// Directories whose files have been read. Tracked apart from `dirs`
    /// so update-mode recordings against a not-yet-loaded directory do
    /// not block a later load.
    loaded: HashSet<PathBuf>,
    /// Effective flag for the run in progress (set by the orchestrator).
    update_mode: bool,
    /// Sticky one-shot request: consumed when a run ends.
    pending_updates: Option<bool>,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(snap_root: P) -> Self {
        Self {
            snap_root: snap_root.into(),
            dirs: HashMap::new(),
            loaded: HashSet::new(),
            update_mode: false,
            pending_updates: None,
        }
    }

    pub fn snap_root(&self) -> &Path {
        &self.snap_root
    }

    /// Pure, deterministic mapping from batch key to its default snapshot
    /// directory: `<root>/<namespace>/<identifier>` (keys without a
    /// separator map to `<root>/<key>`). Distinct keys yield distinct
    /// directories under the `<ns>.<id>` convention.
    pub fn default_snap_dir(&self, key: &str) -> PathBuf {
        match key.split_once(KEY_SEPARATOR) {
            Some((ns, id)) if !ns.is_empty() && !id.is_empty() => {
                self.snap_root.join(ns).join(id)
            }
            _ => self.snap_root.join(key),
        }
    }

    /// Load every not-yet-loaded directory in `dirs` into memory.
    /// Idempotent per directory: a second load is a no-op, so batches
    /// sharing a directory cost one read.
    pub fn load_dirs(&mut self, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            if self.loaded.contains(dir) {
                continue;
            }
            let entries = format::read_snap_dir(dir)?;
            let cache = self.dirs.entry(dir.clone()).or_default();
            for (file, map) in entries {
                for (identity, value) in map {
                    // A recording made before the load wins over disk.
                    if cache.records.get(&identity).is_some_and(|r| r.dirty) {
                        continue;
                    }
                    let stored = format::canonical(&value);
                    cache.records.insert(
                        identity.clone(),
                        SnapshotRecord {
                            identity,
                            value,
                            stored,
                            dirty: false,
                            source_file: file.clone(),
                        },
                    );
                }
            }
            self.loaded.insert(dir.clone());
            metrics::record_snap_dir_loaded();
        }
        Ok(())
    }

    /// Whether a directory has been loaded (tests/diagnostics).
    pub fn dir_loaded(&self, dir: &Path) -> bool {
        self.loaded.contains(dir)
    }

    /// Number of cached records for a directory (tests/diagnostics).
    pub fn record_count(&self, dir: &Path) -> usize {
        self.dirs.get(dir).map(|c| c.records.len()).unwrap_or(0)
    }

    // -------- run-scoped flags --------

    /// Effective update mode for the run in progress.
    pub fn update_mode(&self) -> bool {
        self.update_mode
    }

    pub fn set_update_mode(&mut self, on: bool) {
        self.update_mode = on;
    }

    /// Arm the sticky one-shot update request for the next run.
    pub fn enable_updates(&mut self) {
        self.pending_updates = Some(true);
    }

    pub fn set_pending_updates(&mut self, v: Option<bool>) {
        self.pending_updates = v;
    }

    pub fn pending_updates(&self) -> Option<bool> {
        self.pending_updates
    }

    /// Consume the sticky flag (orchestrator, at run end).
    pub fn take_pending_updates(&mut self) -> Option<bool> {
        self.pending_updates.take()
    }

    // -------- comparison --------

    /// The assertion primitive behind snapshot checks.
    ///
    /// - Update mode: record the value, mark dirty, succeed.
    /// - No record: SnapError::Missing with the would-be file path.
    /// - Otherwise: canonical textual comparison (structural; insensitive
    ///   to reference identity and key order).
    ///
    /// The read path never creates a cache entry: an unloaded directory
    /// misses but stays loadable by a later load_dirs().
    pub fn compare(&mut self, dir: &Path, identity: &str, actual: &Value) -> Result<(), SnapError> {
        metrics::record_snap_compare();
        let actual_text = format::canonical(actual);

        if self.update_mode {
            let cache = self.dirs.entry(dir.to_path_buf()).or_default();
            let source_file = cache
                .records
                .get(identity)
                .map(|r| r.source_file.clone())
                .unwrap_or_else(|| dir.join(SNAP_DEFAULT_FILE));
            cache.records.insert(
                identity.to_string(),
                SnapshotRecord {
                    identity: identity.to_string(),
                    value: actual.clone(),
                    stored: actual_text,
                    dirty: true,
                    source_file,
                },
            );
            return Ok(());
        }

        match self.dirs.get(dir).and_then(|c| c.records.get(identity)) {
            None => {
                metrics::record_snap_miss();
                Err(SnapError::Missing {
                    identity: identity.to_string(),
                    path: dir.join(SNAP_DEFAULT_FILE),
                })
            }
            Some(rec) if rec.stored == actual_text => Ok(()),
            Some(rec) => {
                metrics::record_snap_mismatch();
                Err(SnapError::Mismatch {
                    identity: identity.to_string(),
                    expected: rec.stored.clone(),
                    actual: actual_text,
                })
            }
        }
    }

    // -------- persistence --------

    /// Persist every dirty record, merging into each backing file so
    /// unrelated records already on disk are preserved. Dirty flags are
    /// cleared only after all writes succeed. Returns the record count.
    pub fn update_snapshots(&mut self) -> Result<usize> {
        let mut per_file: BTreeMap<PathBuf, BTreeMap<String, Value>> = BTreeMap::new();
        for cache in self.dirs.values() {
            for rec in cache.records.values() {
                if rec.dirty {
                    per_file
                        .entry(rec.source_file.clone())
                        .or_default()
                        .insert(rec.identity.clone(), rec.value.clone());
                }
            }
        }

        let mut written = 0usize;
        for (file, updates) in &per_file {
            format::merge_into_file(file, updates)?;
            written += updates.len();
        }

        for cache in self.dirs.values_mut() {
            for rec in cache.records.values_mut() {
                rec.dirty = false;
            }
        }
        metrics::record_snap_records_written(written);
        Ok(written)
    }
}
