use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use SnapBatch::{check, check_eq, BatchOptions, HarnessConfig, RunEvent, RunOptions, RunOrchestrator, TestError};

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
fn check_macros_pass_and_fail_with_messages() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("checks"));
    let orch = RunOrchestrator::new(&cfg);

    orch.register(
        "demo.case",
        |ctx| {
            ctx.test("passing checks", |_| {
                check!(1 + 1 == 2);
                check_eq!(2 + 2, 4);
                Ok(())
            });
            ctx.test("failing check", |_| {
                check!(false, "custom message {}", 7);
                Ok(())
            });
            ctx.test("failing check_eq", |_| {
                check_eq!("left", "right");
                Ok(())
            });
            Ok(())
        },
        BatchOptions::default(),
    );

    let failures = Arc::new(Mutex::new(Vec::<String>::new()));
    let f2 = failures.clone();
    let _h = orch.events().subscribe(move |ev| {
        if let RunEvent::TestFail { error, .. } = ev {
            f2.lock().unwrap().push(error.to_string());
        }
    });

    let report = orch.run_all(RunOptions::default()).expect("run");
    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.passed, 1);
    assert_eq!(report.stats.failed, 2);

    let msgs = failures.lock().unwrap().clone();
    assert!(msgs[0].contains("custom message 7"), "got: {}", msgs[0]);
    assert!(
        msgs[1].contains("\"left\"") && msgs[1].contains("\"right\""),
        "both sides in the message: {}",
        msgs[1]
    );
}

#[test]
fn hook_failure_charges_the_surrounded_tests() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("hookfail"));
    let orch = RunOrchestrator::new(&cfg);

    orch.register(
        "demo.case",
        |ctx| {
            ctx.suite("fragile", |s| {
                s.before_all(|| Err(TestError::assertion("setup broke")));
                s.test("a", |_| Ok(()));
                s.test("b", |_| Ok(()));
                Ok(())
            })?;
            ctx.test("outside", |_| Ok(()));
            Ok(())
        },
        BatchOptions::default(),
    );

    let report = orch.run_all(RunOptions::default()).expect("run");
    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.failed, 2, "both tests of the fragile suite fail");
    assert_eq!(report.stats.passed, 1, "sibling outside the suite still passes");
}
