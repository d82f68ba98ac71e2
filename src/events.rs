//! In-process lifecycle event sinks (results-surface side of the core).
//!
//! Scope:
//! - Local (in-process) pub/sub: the orchestrator and registry publish,
//!   a results surface subscribes.
//! - Drop of SinkHandle unsubscribes.
//!
//! Notes:
//! - Callbacks run synchronously on the run thread, between suite/test
//!   boundaries. Keep them fast and non-blocking; spawn a thread if you
//!   need real work.
//! - Publishing clones the callback list and invokes outside the lock, so
//!   a callback may subscribe/unsubscribe without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::errors::TestError;
use crate::run::RunStats;

/// Terminal state of one test, as relayed to the results surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestState {
    Pending,
    Success,
    Failure,
}

/// Lifecycle events emitted during a run.
///
/// Suite events carry `is_batch_root` so a surface can omit the synthetic
/// per-batch wrapper suites from display. `batch_key` is the owning batch
/// of the suite/test (display grouping only, never execution semantics).
#[derive(Clone, Debug)]
pub enum RunEvent {
    RunBegin,
    RunEnd { stats: RunStats, aborted: bool },
    SuiteBegin {
        title: String,
        batch_key: String,
        is_batch_root: bool,
    },
    SuiteEnd { title: String },
    TestBegin { title: String },
    TestEnd { title: String, state: TestState },
    TestFail { title: String, error: TestError },
}

/// Events emitted by the batch registry.
#[derive(Clone, Debug)]
pub enum RegistryEvent {
    /// A batch was registered or replaced; surfaces should re-render.
    Changed { key: String },
    /// Soft validation notice (unknown namespace, duplicate key).
    Warning { message: String },
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct SinkInner<E> {
    next_id: u64,
    sinks: HashMap<u64, Callback<E>>,
}

impl<E> Default for SinkInner<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            sinks: HashMap::new(),
        }
    }
}

/// Sink registry (held by the orchestrator / batch registry).
pub struct SinkRegistry<E> {
    inner: Mutex<SinkInner<E>>,
}

impl<E> SinkRegistry<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SinkInner::default()),
        })
    }

    /// Subscribe to every published event.
    /// Returns a handle; dropping it unsubscribes.
    pub fn subscribe<F>(self: &Arc<Self>, cb: F) -> SinkHandle<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut g = self.inner.lock().unwrap();
        let id = g.next_id;
        g.next_id = g.next_id.wrapping_add(1);
        g.sinks.insert(id, Arc::new(cb));
        drop(g);
        SinkHandle {
            id,
            reg: Arc::downgrade(self),
        }
    }

    /// Publish an event to every subscriber.
    pub fn publish(&self, ev: &E) {
        let callbacks: Vec<Callback<E>> = {
            let g = self.inner.lock().unwrap();
            g.sinks.values().cloned().collect()
        };
        // Execute outside the lock
        for cb in callbacks {
            cb(ev);
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut g = self.inner.lock().unwrap();
        g.sinks.remove(&id);
    }
}

/// RAII handle: unsubscribes on drop.
pub struct SinkHandle<E> {
    id: u64,
    reg: Weak<SinkRegistry<E>>,
}

impl<E> Drop for SinkHandle<E> {
    fn drop(&mut self) {
        if let Some(reg) = self.reg.upgrade() {
            reg.unsubscribe(self.id);
        }
    }
}
