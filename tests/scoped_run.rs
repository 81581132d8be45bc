use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use depscope::{Config, EventKind, FactoryFn, FactoryRef, FactorySeq, Harness, ProvisionError, Scope};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

/// Factory registering `n` numbered cleanups that append to `log`.
fn numbered_cleanups(n: usize, log: &Log) -> FactoryRef<()> {
    let log = Arc::clone(log);
    FactoryFn::arc("numbered", move |scope: Scope| {
        let log = Arc::clone(&log);
        async move {
            for i in 1..=n {
                let log = Arc::clone(&log);
                scope.cleanup(format!("c{i}"), move || async move { push(&log, format!("c{i}")) });
            }
            Ok(())
        }
    })
}

async fn explode() {
    panic!("boom")
}

#[derive(Default)]
struct Flag {
    on: Arc<AtomicBool>,
}

#[tokio::test]
async fn flag_is_reset_once_run_returns() {
    let seen = Arc::new(AtomicBool::new(false));
    let factory: FactoryRef<Flag> = FactoryFn::arc("flag", |scope: Scope| async move {
        let on = Arc::new(AtomicBool::new(true));
        let reset = Arc::clone(&on);
        scope.cleanup("flag = false", move || async move { reset.store(false, Ordering::SeqCst) });
        Ok(Flag { on })
    });

    let root = Scope::root("suite");
    let observed = Arc::clone(&seen);
    let handle: Arc<Mutex<Option<Arc<AtomicBool>>>> = Arc::new(Mutex::new(None));
    let keep = Arc::clone(&handle);
    let passed = root
        .run("flag", Some(&factory), move |_scope, flag: Flag| async move {
            observed.store(flag.on.load(Ordering::SeqCst), Ordering::SeqCst);
            *keep.lock() = Some(Arc::clone(&flag.on));
        })
        .await;

    assert!(passed);
    assert!(seen.load(Ordering::SeqCst), "body saw flag = true");
    let flag = handle.lock().take().expect("body ran");
    assert!(!flag.load(Ordering::SeqCst), "cleanup reset the flag");
    root.finish().await.expect("suite passed");
}

#[tokio::test]
async fn accumulator_is_fresh_per_run_and_shared_by_nested_runs() {
    type Acc = Arc<Mutex<HashMap<String, usize>>>;
    let factory: FactoryRef<Acc> = FactoryFn::arc("accumulator", |scope: Scope| async move {
        let acc: Acc = Arc::new(Mutex::new(HashMap::new()));
        let clear = Arc::clone(&acc);
        scope.cleanup("clear", move || async move { clear.lock().clear() });
        Ok(acc)
    });

    let root = Scope::root("suite");
    for run in 0..3usize {
        let passed = root
            .run(format!("run {run}"), Some(&factory), move |scope, acc: Acc| async move {
                assert!(acc.lock().is_empty(), "fresh map for every run");
                for key in ["a", "b", "c"] {
                    let acc = Arc::clone(&acc);
                    scope
                        .run(key, None, move |_nested, (): ()| async move {
                            acc.lock().insert(key.to_string(), run);
                        })
                        .await;
                }
                assert_eq!(acc.lock().len(), 3);
            })
            .await;
        assert!(passed);
    }
    root.finish().await.expect("suite passed");
}

#[tokio::test]
async fn cleanups_run_in_reverse_on_pass_error_and_panic() {
    for outcome in ["pass", "error", "panic"] {
        let log = new_log();
        let factory = numbered_cleanups(3, &log);
        let root = Scope::root("suite");

        let passed = root
            .run(outcome, Some(&factory), move |_scope, (): ()| async move {
                match outcome {
                    "error" => Err("body returned an error"),
                    "panic" => panic!("body panicked"),
                    _ => Ok(()),
                }
            })
            .await;

        assert_eq!(passed, outcome == "pass", "outcome {outcome}");
        assert_eq!(*log.lock(), ["c3", "c2", "c1"], "outcome {outcome}");
        assert_eq!(root.failed(), outcome != "pass");
    }
}

#[tokio::test]
async fn nested_cleanup_runs_before_ancestor_cleanup() {
    let log = new_log();
    let outer_log = Arc::clone(&log);
    let root = Scope::root("suite");

    let passed = root
        .run("outer", None, move |outer, (): ()| async move {
            let log = Arc::clone(&outer_log);
            outer.cleanup("outer", move || async move { push(&log, "outer") });

            let inner_log = Arc::clone(&outer_log);
            let inner_passed = outer
                .run("inner", None, move |inner, (): ()| async move {
                    let log = Arc::clone(&inner_log);
                    inner.cleanup("inner", move || async move { push(&log, "inner") });
                })
                .await;
            assert!(inner_passed);
            push(&outer_log, "outer body done");
        })
        .await;

    assert!(passed);
    assert_eq!(*log.lock(), ["inner", "outer body done", "outer"]);
}

#[tokio::test]
async fn failed_child_fails_parent_but_not_siblings() {
    let root = Scope::root("suite");
    let mut results = Vec::new();

    results.push(root.run("ok before", None, |_s, (): ()| async {}).await);
    results.push(
        root.run("broken", None, |s, (): ()| async move {
            s.fail("expected 1, got 2");
        })
        .await,
    );
    results.push(root.run("ok after", None, |_s, (): ()| async {}).await);

    assert_eq!(results, [true, false, true]);
    let err = root.finish().await.expect_err("a child failed");
    assert_eq!(err.failures, ["suite/broken: expected 1, got 2"]);
}

#[tokio::test]
async fn missing_factory_yields_default_and_no_cleanup() {
    let root = Scope::root("suite");
    let passed = root
        .run("defaults", None, |scope, deps: (u32, String, Vec<u8>)| async move {
            assert_eq!(deps, (0, String::new(), Vec::new()));
            assert_eq!(scope.pending_cleanups(), 0);
        })
        .await;
    assert!(passed);
}

#[tokio::test]
async fn factory_and_body_run_exactly_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let bodies = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&built);
    let factory: FactoryRef<u64> = FactoryFn::arc("counted", move |_scope: Scope| {
        let counter = Arc::clone(&counter);
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst) as u64) }
    });

    let root = Scope::root("suite");
    let ran = Arc::clone(&bodies);
    root.run("once", Some(&factory), move |_scope, n: u64| async move {
        assert_eq!(n, 0);
        ran.fetch_add(1, Ordering::SeqCst);
    })
    .await;

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(bodies.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequential_runs_get_fresh_values() {
    let factory: FactoryRef<Arc<Mutex<Vec<u8>>>> =
        FactoryFn::arc("fresh vec", |_scope: Scope| async { Ok(Arc::new(Mutex::new(Vec::new()))) });
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    let root = Scope::root("suite");
    for i in 0..3u8 {
        let seen = Arc::clone(&seen);
        root.run("push", Some(&factory), move |_scope, v: Arc<Mutex<Vec<u8>>>| async move {
            seen.lock().push(v.lock().len());
            v.lock().push(i);
        })
        .await;
    }
    assert_eq!(*seen.lock(), [0, 0, 0]);
}

#[tokio::test]
async fn factory_error_skips_body_and_is_reported() {
    let log = new_log();
    let good = numbered_cleanups(2, &log);
    let bad: FactoryRef<()> = FactoryFn::arc("bad", |_scope: Scope| async {
        Err::<(), _>(ProvisionError::other("no capacity"))
    });
    let both: FactoryRef<Vec<(&'static str, ())>> = Arc::new(FactorySeq::new().with("good", good).with("bad", bad));

    let root = Scope::root("suite");
    let body_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&body_ran);
    let passed = root
        .run("deps", Some(&both), move |_scope, _deps: Vec<(&'static str, ())>| async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(!passed);
    assert!(!body_ran.load(Ordering::SeqCst));
    assert_eq!(*log.lock(), ["c2", "c1"], "cleanups of the built member still drain");
    let failures = root.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("suite/deps: dependencies:"), "{failures:?}");
    assert!(failures[0].contains("no capacity"), "{failures:?}");
}

#[tokio::test]
async fn failing_cleanup_does_not_stop_the_drain() {
    let harness = Harness::new(Config::default());
    let mut events = harness.subscribe();
    let log = new_log();
    let root = harness.root("suite");

    let inner = Arc::clone(&log);
    let passed = root
        .run("teardown", None, move |scope, (): ()| async move {
            let first = Arc::clone(&inner);
            scope.cleanup("first", move || async move { push(&first, "first") });
            scope.cleanup("explodes", explode);
            scope.cleanup("errors", || async { Err::<(), _>("disk full") });
        })
        .await;

    assert!(passed, "cleanup faults are warnings");
    assert_eq!(*log.lock(), ["first"]);

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert_eq!(
        kinds,
        [
            EventKind::ScopeStarted,
            EventKind::CleanupFailed,
            EventKind::CleanupPanicked,
            EventKind::ScopePassed,
        ]
    );
    harness.shutdown().await;
}

struct Recorder(Arc<Mutex<Vec<(EventKind, String)>>>);

#[async_trait::async_trait]
impl depscope::Subscribe for Recorder {
    async fn on_event(&self, event: &depscope::Event) {
        let scope = event.scope.as_deref().unwrap_or_default().to_string();
        self.0.lock().push((event.kind, scope));
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn harness_forwards_events_to_subscribers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let subs: Vec<Arc<dyn depscope::Subscribe>> = vec![Arc::new(Recorder(Arc::clone(&seen)))];
    let harness = Harness::builder(Config::default()).with_subscribers(subs).build();

    let root = harness.root("suite");
    root.run("ok", None, |_s, (): ()| async {}).await;
    root.run("bad", None, |_s, (): ()| async { Err::<(), _>("wrong answer") }).await;
    assert!(root.finish().await.is_err());
    harness.shutdown().await;

    assert_eq!(
        *seen.lock(),
        [
            (EventKind::ScopeStarted, "suite/ok".to_string()),
            (EventKind::ScopePassed, "suite/ok".to_string()),
            (EventKind::ScopeStarted, "suite/bad".to_string()),
            (EventKind::ScopeFailed, "suite/bad".to_string()),
            (EventKind::ScopeFailed, "suite".to_string()),
        ]
    );
}
