//! run — the run orchestrator.
//!
//! Given a registry and a store, selects batches, builds the run-scoped
//! declaration tree, drives the engine and relays lifecycle events.
//!
//! State machine: Idle -> Preparing -> Running -> {Completed, Aborted} -> Idle.
//! All state lives in this one value (no ambient globals); a second
//! run_selected() while a run is active is rejected with an error instead
//! of silently untracking the previous run.
//!
//! Failure unit: between RunBegin and RunEnd there is no run-fatal error
//! path. An unregistered key, an unreadable snapshot directory or a
//! throwing registration callback fails only that batch's root suite; an
//! assertion failure fails only its test.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use log::{debug, info};

use crate::config::HarnessConfig;
use crate::consts::BATCH_ROOT_SUFFIX;
use crate::engine::{exec, DeclContext, SuiteNode};
use crate::errors::TestError;
use crate::events::{RunEvent, SinkRegistry};
use crate::metrics;
use crate::registry::{BatchDef, BatchRegistry, SetHost};
use crate::snapshot::SnapshotStore;

/// Aggregate statistics of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub duration_ms: u64,
}

/// Terminal summary returned by run_selected/run_all.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub stats: RunStats,
    pub aborted: bool,
    /// Snapshot records persisted at run end (update mode only).
    pub updated_records: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Preparing,
    Running,
    Completed,
    Aborted,
}

/// Per-run options. `update_snapshots: None` falls back to the store's
/// sticky flag, then to false.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    pub update_snapshots: Option<bool>,
}

struct OrchestratorState {
    phase: RunPhase,
    /// Abort flag of the run in progress; None when idle.
    abort: Option<Arc<AtomicBool>>,
}

/// Orchestrates runs over a BatchRegistry and a SnapshotStore.
///
/// The registry and store sit behind mutexes so a results surface on
/// another thread can register batches or arm the sticky update flag
/// between runs; execution itself is strictly sequential (the store lock
/// is held for the duration of a run).
pub struct RunOrchestrator {
    registry: Arc<Mutex<BatchRegistry>>,
    store: Arc<Mutex<SnapshotStore>>,
    sinks: Arc<SinkRegistry<RunEvent>>,
    state: Mutex<OrchestratorState>,
    running: AtomicBool,
}

impl RunOrchestrator {
    /// Wire up registry and store from a HarnessConfig.
    pub fn new(config: &HarnessConfig) -> Self {
        let registry = match &config.known_namespaces {
            Some(set) => BatchRegistry::with_host(Box::new(SetHost::new(set.iter().cloned()))),
            None => BatchRegistry::new(),
        };
        let mut store = SnapshotStore::new(config.snap_root.clone());
        if config.update_snapshots {
            store.enable_updates();
        }
        Self::with_parts(registry, store)
    }

    pub fn with_parts(registry: BatchRegistry, store: SnapshotStore) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            store: Arc::new(Mutex::new(store)),
            sinks: SinkRegistry::new(),
            state: Mutex::new(OrchestratorState {
                phase: RunPhase::Idle,
                abort: None,
            }),
            running: AtomicBool::new(false),
        }
    }

    /// Lifecycle event sinks (results surface subscribes here).
    pub fn events(&self) -> &Arc<SinkRegistry<RunEvent>> {
        &self.sinks
    }

    pub fn registry(&self) -> Arc<Mutex<BatchRegistry>> {
        self.registry.clone()
    }

    pub fn store(&self) -> Arc<Mutex<SnapshotStore>> {
        self.store.clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.state.lock().unwrap().phase
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Convenience: register a batch through the orchestrator's registry.
    pub fn register<F>(&self, key: &str, callback: F, options: crate::registry::BatchOptions)
    where
        F: Fn(&mut DeclContext) -> Result<()> + Send + Sync + 'static,
    {
        self.registry.lock().unwrap().register(key, callback, options);
    }

    /// Run the given batches in order. Returns the terminal report.
    pub fn run_selected(&self, keys: &[String], options: RunOptions) -> Result<RunReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(anyhow!("run already active; abort it or wait for completion"));
        }

        let result = self.run_inner(keys, options);

        // Always release the active-run guard, even on a preparation error.
        {
            let mut st = self.state.lock().unwrap();
            st.phase = RunPhase::Idle;
            st.abort = None;
        }
        self.running.store(false, Ordering::Release);
        result
    }

    /// Run every registered batch in registry insertion order.
    pub fn run_all(&self, options: RunOptions) -> Result<RunReport> {
        let keys: Vec<String> = {
            let reg = self.registry.lock().unwrap();
            reg.keys().map(|k| k.to_string()).collect()
        };
        self.run_selected(&keys, options)
    }

    /// Ask the active run to stop after the currently executing test.
    /// Cooperative: checked at suite/test boundaries only. No-op when idle.
    pub fn abort(&self) {
        let st = self.state.lock().unwrap();
        match &st.abort {
            Some(flag) => {
                info!("abort requested");
                flag.store(true, Ordering::Relaxed);
            }
            None => debug!("abort ignored: no active run"),
        }
    }

    fn run_inner(&self, keys: &[String], options: RunOptions) -> Result<RunReport> {
        let abort = Arc::new(AtomicBool::new(false));
        {
            let mut st = self.state.lock().unwrap();
            st.phase = RunPhase::Preparing;
            st.abort = Some(abort.clone());
        }

        // Fresh root suite; the surface clears its displayed state here.
        self.sinks.publish(&RunEvent::RunBegin);

        // Snapshot the selected definitions so registration callbacks do
        // not run under the registry lock.
        let defs: Vec<(String, Option<BatchDef>)> = {
            let reg = self.registry.lock().unwrap();
            keys.iter()
                .map(|k| (k.clone(), reg.get(k).cloned()))
                .collect()
        };

        let mut store = self.store.lock().unwrap();

        // Effective update flag: explicit argument, else sticky, else false.
        let update = options
            .update_snapshots
            .or(store.pending_updates())
            .unwrap_or(false);
        store.set_update_mode(update);

        // Declare one batch-root suite per selected key, in order.
        let mut root = SuiteNode::new("", "");
        for (key, def) in &defs {
            let title = format!("{key}{BATCH_ROOT_SUFFIX}");
            let mut suite = SuiteNode::batch_root(&title, key);
            match def {
                None => {
                    suite.failure = Some(TestError::assertion(format!(
                        "batch '{key}' is not registered"
                    )));
                }
                Some(def) => {
                    let snap_dir = def
                        .snap_dir
                        .clone()
                        .unwrap_or_else(|| store.default_snap_dir(key));
                    // Loading the batch directory (idempotent per dir) is
                    // part of declaring the batch: a corrupt snapshot file
                    // fails this root suite only, siblings still run.
                    if let Err(e) = store.load_dirs(std::slice::from_ref(&snap_dir)) {
                        suite.failure = Some(TestError::assertion(format!(
                            "snapshot load failed: {e:#}"
                        )));
                    } else {
                        let callback = def.callback.clone();
                        let declared = {
                            let mut ctx = DeclContext::new(&mut suite, key, &snap_dir);
                            catch_unwind(AssertUnwindSafe(|| callback(&mut ctx)))
                        };
                        match declared {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                suite.children.clear();
                                suite.failure = Some(TestError::assertion(format!(
                                    "registration failed: {e:#}"
                                )));
                            }
                            Err(p) => {
                                suite.children.clear();
                                suite.failure = Some(TestError::from_panic(p));
                            }
                        }
                    }
                }
            }
            root.children.push(crate::engine::Node::Suite(suite));
        }

        {
            let mut st = self.state.lock().unwrap();
            st.phase = RunPhase::Running;
        }
        metrics::record_run_started();
        info!("run started: {} batch(es), update_snapshots={}", defs.len(), update);

        let outcome = exec::execute(&root, &mut store, &self.sinks, &abort);

        {
            let mut st = self.state.lock().unwrap();
            st.phase = if outcome.aborted {
                RunPhase::Aborted
            } else {
                RunPhase::Completed
            };
        }
        if outcome.aborted {
            metrics::record_run_aborted();
        } else {
            metrics::record_run_completed();
        }

        let updated = if update { store.update_snapshots() } else { Ok(0) };

        // Consume run-scoped flags: update mode off, sticky flag cleared.
        store.set_update_mode(false);
        store.take_pending_updates();
        drop(store);

        // RunEnd reaches the surface even when the update write failed;
        // the write error itself still reaches the caller below.
        self.sinks.publish(&RunEvent::RunEnd {
            stats: outcome.stats,
            aborted: outcome.aborted,
        });
        info!(
            "run finished: total={} passed={} failed={} pending={} aborted={} ({} ms)",
            outcome.stats.total,
            outcome.stats.passed,
            outcome.stats.failed,
            outcome.stats.pending,
            outcome.aborted,
            outcome.stats.duration_ms
        );
        let updated_records = updated?;

        Ok(RunReport {
            stats: outcome.stats,
            aborted: outcome.aborted,
            updated_records,
        })
    }
}
