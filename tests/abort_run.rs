use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use SnapBatch::{
    BatchOptions, HarnessConfig, RunEvent, RunOptions, RunOrchestrator, RunPhase, TestState,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("sbtest-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn abort_after_first_test_shortens_the_run_cleanly() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("abort"));
    let orch = Arc::new(RunOrchestrator::new(&cfg));

    orch.register(
        "demo.case",
        |ctx| {
            ctx.test("one", |_| Ok(()));
            ctx.test("two", |_| Ok(()));
            ctx.test("three", |_| Ok(()));
            Ok(())
        },
        BatchOptions::default(),
    );

    // Abort as soon as the first test finishes; checked at the next
    // test boundary, so "two" and "three" never start.
    let ends = Arc::new(Mutex::new(Vec::<(String, TestState)>::new()));
    let orch2 = orch.clone();
    let ends2 = ends.clone();
    let _h = orch.events().subscribe(move |ev| {
        if let RunEvent::TestEnd { title, state } = ev {
            ends2.lock().unwrap().push((title.clone(), *state));
            orch2.abort();
        }
    });

    let report = orch
        .run_selected(&["demo.case".to_string()], RunOptions::default())
        .expect("run");

    assert!(report.aborted);
    assert!(report.stats.total < 3, "run shortened: {:?}", report.stats);
    assert_eq!(report.stats.total, 1);
    assert_eq!(report.stats.passed, 1);

    // The in-flight test reached a terminal state, never "in progress".
    let seen = ends.lock().unwrap().clone();
    assert_eq!(seen, vec![("one".to_string(), TestState::Success)]);

    assert_eq!(orch.phase(), RunPhase::Idle, "handle cleared after run end");
}

#[test]
fn abort_while_idle_is_a_no_op() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("idle"));
    let orch = RunOrchestrator::new(&cfg);
    orch.abort(); // nothing to stop; must not panic or wedge state

    orch.register(
        "demo.case",
        |ctx| {
            ctx.test("t", |_| Ok(()));
            Ok(())
        },
        BatchOptions::default(),
    );
    let report = orch.run_all(RunOptions::default()).expect("run");
    assert_eq!(report.stats.passed, 1);
    assert!(!report.aborted, "stale abort must not leak into a new run");
}

#[test]
fn aborted_run_still_emits_a_well_formed_run_end() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("summary"));
    let orch = Arc::new(RunOrchestrator::new(&cfg));

    orch.register(
        "demo.a",
        |ctx| {
            ctx.test("t", |_| Ok(()));
            Ok(())
        },
        BatchOptions::default(),
    );
    orch.register(
        "demo.b",
        |ctx| {
            ctx.test("t", |_| Ok(()));
            Ok(())
        },
        BatchOptions::default(),
    );

    let end = Arc::new(Mutex::new(None::<(usize, bool)>));
    let orch2 = orch.clone();
    let end2 = end.clone();
    let _h = orch.events().subscribe(move |ev| match ev {
        RunEvent::TestEnd { .. } => orch2.abort(),
        RunEvent::RunEnd { stats, aborted } => {
            *end2.lock().unwrap() = Some((stats.total, *aborted));
        }
        _ => {}
    });

    orch.run_all(RunOptions::default()).expect("run");

    let (total, aborted) = end.lock().unwrap().expect("run-end emitted");
    assert!(aborted);
    assert_eq!(total, 1, "summary covers only the tests that executed");
}
