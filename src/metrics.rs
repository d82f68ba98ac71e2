//! Lightweight global metrics for SnapBatch.
//!
//! Thread-safe atomic counters for the subsystems:
//! - Batch registry
//! - Run orchestrator
//! - Snapshot store

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Registry -----
static BATCHES_REGISTERED: AtomicU64 = AtomicU64::new(0);
static REGISTRY_OVERWRITES: AtomicU64 = AtomicU64::new(0);
static REGISTRY_WARNINGS: AtomicU64 = AtomicU64::new(0);

// ----- Runs -----
static RUNS_STARTED: AtomicU64 = AtomicU64::new(0);
static RUNS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static RUNS_ABORTED: AtomicU64 = AtomicU64::new(0);
static TESTS_PASSED: AtomicU64 = AtomicU64::new(0);
static TESTS_FAILED: AtomicU64 = AtomicU64::new(0);

// ----- Snapshots -----
static SNAP_COMPARES: AtomicU64 = AtomicU64::new(0);
static SNAP_MISSES: AtomicU64 = AtomicU64::new(0);
static SNAP_MISMATCHES: AtomicU64 = AtomicU64::new(0);
static SNAP_RECORDS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SNAP_DIRS_LOADED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    // Registry
    pub batches_registered: u64,
    pub registry_overwrites: u64,
    pub registry_warnings: u64,

    // Runs
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_aborted: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,

    // Snapshots
    pub snap_compares: u64,
    pub snap_misses: u64,
    pub snap_mismatches: u64,
    pub snap_records_written: u64,
    pub snap_dirs_loaded: u64,
}

impl MetricsSnapshot {
    pub fn test_pass_ratio(&self) -> f64 {
        let total = self.tests_passed + self.tests_failed;
        if total == 0 {
            0.0
        } else {
            self.tests_passed as f64 / total as f64
        }
    }

    pub fn snap_hit_ratio(&self) -> f64 {
        if self.snap_compares == 0 {
            0.0
        } else {
            let bad = self.snap_misses + self.snap_mismatches;
            (self.snap_compares.saturating_sub(bad)) as f64 / self.snap_compares as f64
        }
    }
}

// ----- Recorders (Registry) -----
pub fn record_batch_registered() {
    BATCHES_REGISTERED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_registry_overwrite() {
    REGISTRY_OVERWRITES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_registry_warning() {
    REGISTRY_WARNINGS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Runs) -----
pub fn record_run_started() {
    RUNS_STARTED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_run_completed() {
    RUNS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_run_aborted() {
    RUNS_ABORTED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_test_passed() {
    TESTS_PASSED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_test_failed() {
    TESTS_FAILED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Snapshots) -----
pub fn record_snap_compare() {
    SNAP_COMPARES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_snap_miss() {
    SNAP_MISSES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_snap_mismatch() {
    SNAP_MISMATCHES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_snap_records_written(n: usize) {
    SNAP_RECORDS_WRITTEN.fetch_add(n as u64, Ordering::Relaxed);
}
pub fn record_snap_dir_loaded() {
    SNAP_DIRS_LOADED.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        batches_registered: BATCHES_REGISTERED.load(Ordering::Relaxed),
        registry_overwrites: REGISTRY_OVERWRITES.load(Ordering::Relaxed),
        registry_warnings: REGISTRY_WARNINGS.load(Ordering::Relaxed),

        runs_started: RUNS_STARTED.load(Ordering::Relaxed),
        runs_completed: RUNS_COMPLETED.load(Ordering::Relaxed),
        runs_aborted: RUNS_ABORTED.load(Ordering::Relaxed),
        tests_passed: TESTS_PASSED.load(Ordering::Relaxed),
        tests_failed: TESTS_FAILED.load(Ordering::Relaxed),

        snap_compares: SNAP_COMPARES.load(Ordering::Relaxed),
        snap_misses: SNAP_MISSES.load(Ordering::Relaxed),
        snap_mismatches: SNAP_MISMATCHES.load(Ordering::Relaxed),
        snap_records_written: SNAP_RECORDS_WRITTEN.load(Ordering::Relaxed),
        snap_dirs_loaded: SNAP_DIRS_LOADED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    BATCHES_REGISTERED.store(0, Ordering::Relaxed);
    REGISTRY_OVERWRITES.store(0, Ordering::Relaxed);
    REGISTRY_WARNINGS.store(0, Ordering::Relaxed);

    RUNS_STARTED.store(0, Ordering::Relaxed);
    RUNS_COMPLETED.store(0, Ordering::Relaxed);
    RUNS_ABORTED.store(0, Ordering::Relaxed);
    TESTS_PASSED.store(0, Ordering::Relaxed);
    TESTS_FAILED.store(0, Ordering::Relaxed);

    SNAP_COMPARES.store(0, Ordering::Relaxed);
    SNAP_MISSES.store(0, Ordering::Relaxed);
    SNAP_MISMATCHES.store(0, Ordering::Relaxed);
    SNAP_RECORDS_WRITTEN.store(0, Ordering::Relaxed);
    SNAP_DIRS_LOADED.store(0, Ordering::Relaxed);
}
