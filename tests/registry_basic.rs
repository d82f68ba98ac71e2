use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use SnapBatch::{
    BatchOptions, HarnessConfig, RegistryEvent, RunOptions, RunOrchestrator,
};

// Unique temp roots for tests
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
fn reregistering_a_key_runs_only_the_latest_callback() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("rereg"));
    let orch = RunOrchestrator::new(&cfg);

    let hits = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let h1 = hits.clone();
    orch.register(
        "demo.case",
        move |ctx| {
            let h = h1.clone();
            ctx.test("t", move |_| {
                h.lock().unwrap().push("first");
                Ok(())
            });
            Ok(())
        },
        BatchOptions::default(),
    );

    let h2 = hits.clone();
    orch.register(
        "demo.case",
        move |ctx| {
            let h = h2.clone();
            ctx.test("t", move |_| {
                h.lock().unwrap().push("second");
                Ok(())
            });
            Ok(())
        },
        BatchOptions::default(),
    );

    let report = orch
        .run_selected(&["demo.case".to_string()], RunOptions::default())
        .expect("run");
    assert_eq!(report.stats.total, 1);
    assert_eq!(report.stats.passed, 1);

    let seen = hits.lock().unwrap().clone();
    assert_eq!(seen, vec!["second"], "latest callback entirely supersedes");
}

#[test]
fn duplicate_and_unknown_namespace_warn_but_never_fail() {
    let cfg = HarnessConfig::default()
        .with_snap_root(unique_root("warns"))
        .with_known_namespaces(["demo"]);
    let orch = RunOrchestrator::new(&cfg);

    let warnings = Arc::new(Mutex::new(Vec::<String>::new()));
    let registry = orch.registry();
    let _h = {
        let w = warnings.clone();
        let reg = registry.lock().unwrap();
        reg.sinks().subscribe(move |ev| {
            if let RegistryEvent::Warning { message } = ev {
                w.lock().unwrap().push(message.clone());
            }
        })
    };

    orch.register("stranger.case", |_| Ok(()), BatchOptions::default());
    orch.register("demo.case", |_| Ok(()), BatchOptions::default());
    orch.register("demo.case", |_| Ok(()), BatchOptions::default());

    {
        let reg = registry.lock().unwrap();
        assert_eq!(reg.len(), 2, "both keys registered despite warnings");
        let keys: Vec<String> = reg.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["stranger.case", "demo.case"]);
    }

    let w = warnings.lock().unwrap();
    assert_eq!(w.len(), 2, "one unknown-namespace, one duplicate: {w:?}");
    assert!(w[0].contains("unknown namespace"));
    assert!(w[1].contains("already exists"));
}

#[test]
fn registry_insertion_order_is_default_run_order() {
    let cfg = HarnessConfig::default().with_snap_root(unique_root("order"));
    let orch = RunOrchestrator::new(&cfg);

    let order = Arc::new(Mutex::new(Vec::<String>::new()));
    for key in ["b.two", "a.one", "c.three"] {
        let o = order.clone();
        orch.register(
            key,
            move |ctx| {
                let o = o.clone();
                let key = ctx.batch_key().to_string();
                ctx.test("t", move |_| {
                    o.lock().unwrap().push(key.clone());
                    Ok(())
                });
                Ok(())
            },
            BatchOptions::default(),
        );
    }

    let report = orch.run_all(RunOptions::default()).expect("run all");
    assert_eq!(report.stats.total, 3);

    let seen = order.lock().unwrap().clone();
    assert_eq!(seen, vec!["b.two", "a.one", "c.three"]);
}
