//! # Run one nested scope.
//!
//! Creates the child scope, builds its dependencies, calls the body and drains the
//! child's cleanups. Publishes lifecycle events to the harness [`Bus`](crate::events::Bus).
//!
//! ## Flow
//!
//! ```text
//! child = parent.child(name)                      → ScopeStarted
//! provide(child) ── Ok(deps) ──► body(child, deps) ── Ok / Err / panic
//!      │                                                   │
//!      └── Err / panic → child.fail(..), body skipped      │
//!                                                          ▼
//!                                      drain cleanups (LIFO, isolated)
//!                                                          ▼
//!                              ScopePassed | ScopeFailed (+ fail parent)
//! ```
//!
//! ## Rules
//! - The factory and the body are each invoked **at most once**; the body only when
//!   the factory succeeded.
//! - Cleanups drain on every path, including when the run future is dropped
//!   (the [`DrainGuard`] hands the drain to the runtime).
//! - Always publishes **exactly one** terminal event: `ScopePassed` or `ScopeFailed`.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::core::outcome::Outcome;
use crate::core::panic_message;
use crate::core::scope::Scope;
use crate::error::ProvisionError;
use crate::events::{Event, EventKind};

/// Runs `body` in a child of `parent` named `name`, with dependencies from `provide`.
///
/// Returns `true` if the child scope passed.
pub(crate) async fn run_scoped<D, P, PFut, B, Fut>(parent: &Scope, name: &str, provide: P, body: B) -> bool
where
    P: FnOnce(Scope) -> PFut,
    PFut: Future<Output = Result<D, ProvisionError>>,
    B: FnOnce(Scope, D) -> Fut,
    Fut: Future,
    Fut::Output: Outcome,
{
    let child = parent.child(name);
    let guard = DrainGuard::new(child.clone());
    child.publish(Event::new(EventKind::ScopeStarted));

    let scope = child.clone();
    let provided = AssertUnwindSafe(async move { provide(scope).await })
        .catch_unwind()
        .await;

    match provided {
        Ok(Ok(deps)) => {
            let scope = child.clone();
            let outcome = AssertUnwindSafe(async move { body(scope, deps).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(out) => {
                    if let Err(msg) = out.into_result() {
                        child.fail(msg);
                    }
                }
                Err(panic) => child.fail(format!("panicked: {}", panic_message(panic.as_ref()))),
            }
        }
        Ok(Err(e)) => {
            tracing::debug!(scope = %child.path(), label = e.as_label(), "dependencies not built; body skipped");
            child.fail(format!("dependencies: {}", e.as_message()));
        }
        Err(panic) => {
            child.fail(format!("factory panicked: {}", panic_message(panic.as_ref())));
        }
    }

    child.drain().await;
    guard.disarm();
    child.conclude()
}

/// Drains a scope in the background if its run future is dropped mid-flight.
struct DrainGuard {
    scope: Option<Scope>,
}

impl DrainGuard {
    fn new(scope: Scope) -> Self {
        Self { scope: Some(scope) }
    }

    fn disarm(mut self) {
        self.scope = None;
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.drain_detached();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[tokio::test]
    async fn factory_error_skips_body_but_drains() {
        let root = Scope::root("suite");
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        let passed = run_scoped(
            &root,
            "broken",
            move |scope: Scope| async move {
                let l2 = Arc::clone(&l);
                scope.cleanup("partial", move || async move { l2.lock().push("cleanup") });
                Err::<(), _>(ProvisionError::other("no luck"))
            },
            |_scope, ()| {
                let l = Arc::clone(&log);
                async move { l.lock().push("body") }
            },
        )
        .await;

        assert!(!passed);
        assert!(root.failed());
        assert_eq!(*log.lock(), ["cleanup"]);
    }

    async fn exploding(_scope: Scope) -> Result<(), ProvisionError> {
        panic!("factory blew up")
    }

    #[tokio::test]
    async fn factory_panic_is_recorded() {
        let root = Scope::root("suite");
        let passed = run_scoped(
            &root,
            "panics",
            exploding,
            |_scope, (): ()| async {},
        )
        .await;

        assert!(!passed);
        assert!(root.failures()[0].contains("factory blew up"));
    }

    #[tokio::test]
    async fn dropped_run_still_drains() {
        let root = Scope::root("suite");
        let (tx, rx) = tokio::sync::oneshot::channel();

        let run = run_scoped(
            &root,
            "cancelled",
            move |scope: Scope| async move {
                scope.cleanup("notify", move || async move {
                    let _ = tx.send(());
                });
                Ok::<_, ProvisionError>(())
            },
            |_scope, ()| std::future::pending::<()>(),
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(20), run).await;
        assert!(timed_out.is_err());

        rx.await.expect("cleanup ran after cancellation");
    }
}
