//! Sequential reference runner over the declaration tree.
//!
//! Semantics:
//! - Depth-first, declaration order, one logical thread; test bodies never
//!   run in parallel.
//! - before_all once at suite entry; before_each/after_each (ancestors
//!   first) around every test; after_all at suite exit.
//! - A failed before_all fails every test of the suite with that error;
//!   a failed before_each fails the surrounded test; after_* errors are
//!   logged and never override a test's own result.
//! - The abort flag is honored at suite/test boundaries only: the test in
//!   flight always reaches a terminal state, and a shortened run still
//!   produces a well-formed summary for the tests that executed.
//! - Panics in test bodies are caught and reported as TestError::Panic.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use crate::consts::TITLE_JOINER;
use crate::engine::{HookFn, Node, SuiteNode, TestBody, TestCtx, TestNode};
use crate::errors::TestError;
use crate::events::{RunEvent, SinkRegistry, TestState};
use crate::metrics;
use crate::run::RunStats;
use crate::snapshot::SnapshotStore;
use crate::util::now_millis;

pub struct ExecOutcome {
    pub stats: RunStats,
    pub aborted: bool,
}

/// Execute the children of the run root. The root itself is synthetic and
/// emits no events; its children are the batch-root suites.
pub fn execute(
    root: &SuiteNode,
    store: &mut SnapshotStore,
    sinks: &SinkRegistry<RunEvent>,
    abort: &AtomicBool,
) -> ExecOutcome {
    let started = now_millis();
    let mut w = Walker {
        store,
        sinks,
        abort,
        stats: RunStats::default(),
        aborted: false,
    };

    for child in &root.children {
        if w.check_abort() {
            break;
        }
        match child {
            Node::Suite(s) => w.run_suite(s, &[], Vec::new(), Vec::new(), None),
            Node::Test(t) => w.run_test(t, &[], &[], &[], None),
        }
    }

    let mut stats = w.stats;
    stats.duration_ms = now_millis().saturating_sub(started);
    ExecOutcome {
        stats,
        aborted: w.aborted,
    }
}

struct Walker<'a> {
    store: &'a mut SnapshotStore,
    sinks: &'a SinkRegistry<RunEvent>,
    abort: &'a AtomicBool,
    stats: RunStats,
    aborted: bool,
}

impl Walker<'_> {
    fn check_abort(&mut self) -> bool {
        if self.aborted {
            return true;
        }
        if self.abort.load(Ordering::Relaxed) {
            debug!("abort observed at boundary; stopping traversal");
            self.aborted = true;
        }
        self.aborted
    }

    fn run_suite(
        &mut self,
        suite: &SuiteNode,
        titles: &[String],
        mut before_each: Vec<HookFn>,
        mut after_each: Vec<HookFn>,
        inherited_failure: Option<&TestError>,
    ) {
        self.sinks.publish(&RunEvent::SuiteBegin {
            title: suite.title.clone(),
            batch_key: suite.batch_key.clone(),
            is_batch_root: suite.is_batch_root,
        });

        // Registration failure: the suite fails as a unit, children are
        // not executed (siblings are unaffected).
        if let Some(err) = &suite.failure {
            self.fail_whole_suite(suite, err);
            self.sinks.publish(&RunEvent::SuiteEnd {
                title: suite.title.clone(),
            });
            return;
        }

        // Batch-root titles are excluded from hierarchical identities.
        let mut path: Vec<String> = titles.to_vec();
        if !suite.is_batch_root {
            path.push(suite.title.clone());
        }

        let mut failure: Option<TestError> = inherited_failure.cloned();
        if failure.is_none() {
            for hook in &suite.hooks.before_all {
                if let Err(e) = run_hook(hook) {
                    warn!("before_all failed in '{}': {}", suite.title, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        before_each.extend(suite.hooks.before_each.iter().cloned());
        after_each.extend(suite.hooks.after_each.iter().cloned());

        for child in &suite.children {
            if self.check_abort() {
                break;
            }
            match child {
                Node::Suite(s) => {
                    self.run_suite(s, &path, before_each.clone(), after_each.clone(), failure.as_ref())
                }
                Node::Test(t) => self.run_test(t, &path, &before_each, &after_each, failure.as_ref()),
            }
        }

        for hook in &suite.hooks.after_all {
            if let Err(e) = run_hook(hook) {
                warn!("after_all failed in '{}': {}", suite.title, e);
            }
        }

        self.sinks.publish(&RunEvent::SuiteEnd {
            title: suite.title.clone(),
        });
    }

    /// Report a suite whose registration failed: one failure under the
    /// suite's own title, no children executed.
    fn fail_whole_suite(&mut self, suite: &SuiteNode, err: &TestError) {
        self.sinks.publish(&RunEvent::TestBegin {
            title: suite.title.clone(),
        });
        self.stats.total += 1;
        self.stats.failed += 1;
        metrics::record_test_failed();
        self.sinks.publish(&RunEvent::TestFail {
            title: suite.title.clone(),
            error: err.clone(),
        });
        self.sinks.publish(&RunEvent::TestEnd {
            title: suite.title.clone(),
            state: TestState::Failure,
        });
    }

    fn run_test(
        &mut self,
        test: &TestNode,
        titles: &[String],
        before_each: &[HookFn],
        after_each: &[HookFn],
        suite_failure: Option<&TestError>,
    ) {
        let full_title = if titles.is_empty() {
            test.title.clone()
        } else {
            format!("{}{}{}", titles.join(TITLE_JOINER), TITLE_JOINER, test.title)
        };

        self.sinks.publish(&RunEvent::TestBegin {
            title: full_title.clone(),
        });
        self.stats.total += 1;

        let body = match &test.body {
            TestBody::Pending => {
                self.stats.pending += 1;
                self.sinks.publish(&RunEvent::TestEnd {
                    title: full_title,
                    state: TestState::Pending,
                });
                return;
            }
            TestBody::Run(f) => f,
        };

        let result = if let Some(err) = suite_failure {
            Err(err.clone())
        } else {
            self.run_body(body, test, before_each, after_each, &full_title)
        };

        match result {
            Ok(()) => {
                self.stats.passed += 1;
                metrics::record_test_passed();
                self.sinks.publish(&RunEvent::TestEnd {
                    title: full_title,
                    state: TestState::Success,
                });
            }
            Err(e) => {
                self.stats.failed += 1;
                metrics::record_test_failed();
                self.sinks.publish(&RunEvent::TestFail {
                    title: full_title.clone(),
                    error: e,
                });
                self.sinks.publish(&RunEvent::TestEnd {
                    title: full_title,
                    state: TestState::Failure,
                });
            }
        }
    }

    fn run_body(
        &mut self,
        body: &std::sync::Arc<dyn Fn(&mut TestCtx) -> Result<(), TestError> + Send + Sync>,
        test: &TestNode,
        before_each: &[HookFn],
        after_each: &[HookFn],
        full_title: &str,
    ) -> Result<(), TestError> {
        for hook in before_each {
            run_hook(hook)?;
        }

        let result = {
            let mut ctx = TestCtx::new(self.store, &test.snap_dir, full_title);
            catch_unwind(AssertUnwindSafe(|| body(&mut ctx)))
                .unwrap_or_else(|p| Err(TestError::from_panic(p)))
        };

        for hook in after_each {
            if let Err(e) = run_hook(hook) {
                warn!("after_each failed for '{}': {}", full_title, e);
            }
        }

        result
    }
}

fn run_hook(hook: &HookFn) -> Result<(), TestError> {
    catch_unwind(AssertUnwindSafe(|| hook())).unwrap_or_else(|p| Err(TestError::from_panic(p)))
}
