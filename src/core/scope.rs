//! # Scope: one test or subtest execution context.
//!
//! A [`Scope`] is a cheap, cloneable handle to shared per-scope state:
//!
//! ```text
//! Scope ──► Arc<Inner>
//!            ├─ name, path ("suite/redis/get"), parent
//!            ├─ failed flag + recorded failures
//!            ├─ cleanup stack (LIFO, drained once, then closed)
//!            └─ shared harness state (Config, Bus)
//! ```
//!
//! Dependencies are attached to a scope through [`Scope::run`] / [`Scope::run_with`],
//! which create a child scope, build the dependencies with a
//! [`DepFactory`](crate::DepFactory), call the body and drain the child's cleanups
//! before returning.
//!
//! ## Rules
//! - Cleanups drain in strict reverse registration order, exactly once.
//! - A failed child fails its parent; the parent keeps running.
//! - A cleanup registered after the drain finished is run immediately on the
//!   current runtime (or reported as leaked when there is none).

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::core::cleanup::{Cleanup, CleanupFault, CleanupStack};
use crate::core::config::Config;
use crate::core::outcome::Outcome;
use crate::core::runner;
use crate::error::ScopeFailure;
use crate::events::{Bus, Event, EventKind};
use crate::factories::{DepFactory, FactoryRef};

/// State shared by every scope of one harness.
pub(crate) struct Shared {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
}

impl Shared {
    pub(crate) fn new(cfg: Config) -> Arc<Self> {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Arc::new(Self { cfg, bus })
    }
}

#[derive(Clone, Debug)]
struct Failure {
    scope: Arc<str>,
    message: String,
}

struct Inner {
    name: Arc<str>,
    path: Arc<str>,
    parent: Option<Scope>,
    shared: Arc<Shared>,
    failed: AtomicBool,
    failures: Mutex<Vec<Failure>>,
    cleanups: Mutex<CleanupStack>,
}

/// Handle to one execution context (a test or a nested subtest).
///
/// Clones refer to the same scope. `Scope` is `Send + Sync`, so a body may hand it
/// to spawned workers; it must join them before returning.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// Creates a root scope with a default configuration and no subscribers.
    ///
    /// Use [`Harness::root`](crate::Harness::root) to share a configuration and
    /// event bus between roots.
    pub fn root(name: impl Into<Arc<str>>) -> Scope {
        Scope::new_root(name.into(), Shared::new(Config::default()))
    }

    pub(crate) fn new_root(name: Arc<str>, shared: Arc<Shared>) -> Scope {
        Scope::from_parts(Arc::clone(&name), name, None, shared)
    }

    pub(crate) fn child(&self, name: &str) -> Scope {
        let path = format!("{}{}{}", self.path(), self.inner.shared.cfg.separator, name);
        Scope::from_parts(
            Arc::from(name),
            Arc::from(path),
            Some(self.clone()),
            Arc::clone(&self.inner.shared),
        )
    }

    fn from_parts(name: Arc<str>, path: Arc<str>, parent: Option<Scope>, shared: Arc<Shared>) -> Scope {
        Scope {
            inner: Arc::new(Inner {
                name,
                path,
                parent,
                shared,
                failed: AtomicBool::new(false),
                failures: Mutex::new(Vec::new()),
                cleanups: Mutex::new(CleanupStack::default()),
            }),
        }
    }

    /// Runs `body` in a child scope named `name`.
    ///
    /// With `Some(factory)` the factory is invoked once with the child scope and its
    /// value is passed to the body. With `None` the body receives `D::default()`
    /// and no cleanup is registered on its behalf.
    ///
    /// Returns `true` if the child scope passed. A failed child also fails `self`.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use depscope::{FactoryFn, FactoryRef, Scope};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let flag = Arc::new(AtomicBool::new(false));
    /// let factory: FactoryRef<Arc<AtomicBool>> = FactoryFn::arc("flag", {
    ///     let flag = Arc::clone(&flag);
    ///     move |scope: Scope| {
    ///         let flag = Arc::clone(&flag);
    ///         async move {
    ///             flag.store(true, Ordering::SeqCst);
    ///             let reset = Arc::clone(&flag);
    ///             scope.cleanup("reset flag", move || async move { reset.store(false, Ordering::SeqCst) });
    ///             Ok(flag)
    ///         }
    ///     }
    /// });
    ///
    /// let root = Scope::root("suite");
    /// let passed = root
    ///     .run("sees flag", Some(&factory), |_scope, flag: Arc<AtomicBool>| async move {
    ///         assert!(flag.load(Ordering::SeqCst));
    ///     })
    ///     .await;
    ///
    /// assert!(passed);
    /// assert!(!flag.load(Ordering::SeqCst));
    /// # }
    /// ```
    pub async fn run<D, B, Fut>(
        &self,
        name: impl AsRef<str>,
        factory: Option<&FactoryRef<D>>,
        body: B,
    ) -> bool
    where
        D: Default + 'static,
        B: FnOnce(Scope, D) -> Fut,
        Fut: Future,
        Fut::Output: Outcome,
    {
        runner::run_scoped(
            self,
            name.as_ref(),
            |scope: Scope| async move {
                match factory {
                    Some(factory) => (**factory).build(&scope).await,
                    None => Ok(D::default()),
                }
            },
            body,
        )
        .await
    }

    /// Runs `body` in a child scope with dependencies built by `factory`.
    ///
    /// Same as [`Scope::run`] without the `Default` bound; accepts any factory,
    /// shared ([`FactoryRef`]) or concrete.
    pub async fn run_with<D, F, B, Fut>(&self, name: impl AsRef<str>, factory: &F, body: B) -> bool
    where
        F: DepFactory<D> + ?Sized,
        B: FnOnce(Scope, D) -> Fut,
        Fut: Future,
        Fut::Output: Outcome,
    {
        runner::run_scoped(
            self,
            name.as_ref(),
            |scope: Scope| async move { factory.build(&scope).await },
            body,
        )
        .await
    }

    /// Registers a cleanup action.
    ///
    /// Cleanups run when the scope ends, most recently registered first. The action
    /// may return `()` or `Result<(), E>`; an `Err` or a panic is reported and the
    /// remaining cleanups still run.
    pub fn cleanup<F, Fut>(&self, label: impl Into<Cow<'static, str>>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Outcome,
    {
        let cleanup = Cleanup::new(label, action);
        let refused = self.inner.cleanups.lock().push(cleanup);
        if let Err(late) = refused {
            self.run_late(late);
        }
    }

    fn run_late(&self, late: Cleanup) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(scope = %self.path(), cleanup = %late.label, "cleanup registered after scope ended; running now");
                let scope = self.clone();
                handle.spawn(async move { scope.run_one(late).await });
            }
            Err(_) => {
                tracing::error!(scope = %self.path(), cleanup = %late.label, "cleanup registered after scope ended and no runtime to run it");
                self.publish(Event::new(EventKind::CleanupLeaked).with_subject(late.label.as_ref()));
            }
        }
    }

    /// Records a failure; the scope keeps running.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(scope = %self.path(), %message, "scope failure recorded");
        self.inner.failed.store(true, Ordering::SeqCst);
        self.inner.failures.lock().push(Failure {
            scope: Arc::clone(&self.inner.path),
            message,
        });
    }

    /// Writes a diagnostic line attributed to this scope.
    pub fn log(&self, message: impl fmt::Display) {
        tracing::info!(scope = %self.path(), "{message}");
    }

    /// True once any failure has been recorded (here or in a child).
    pub fn failed(&self) -> bool {
        self.inner.failed.load(Ordering::SeqCst)
    }

    /// Recorded failures as `"<scope path>: <message>"`, in recording order.
    pub fn failures(&self) -> Vec<String> {
        self.inner
            .failures
            .lock()
            .iter()
            .map(|f| format!("{}: {}", f.scope, f.message))
            .collect()
    }

    /// Name given to this scope.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Separator-joined names from the root down to this scope.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Parent scope, `None` for roots.
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Configuration shared by this scope's harness.
    pub fn config(&self) -> &Config {
        &self.inner.shared.cfg
    }

    /// Number of cleanups waiting to run.
    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.lock().len()
    }

    /// Drains this scope's cleanups and reports its outcome.
    ///
    /// Meant for root scopes at the end of a test; nested scopes are finished by
    /// their run call.
    ///
    /// # Errors
    /// [`ScopeFailure`] with every recorded failure if the scope failed.
    pub async fn finish(self) -> Result<(), ScopeFailure> {
        self.drain().await;
        self.conclude();
        if self.failed() {
            return Err(ScopeFailure {
                scope: self.path().to_string(),
                failures: self.failures(),
            });
        }
        Ok(())
    }

    /// Publishes `ev` on the harness bus, tagged with this scope's path.
    pub(crate) fn publish(&self, ev: Event) {
        self.inner.shared.bus.publish(ev.with_scope(Arc::clone(&self.inner.path)));
    }

    /// Pops and runs cleanups until the stack is empty, then closes it.
    pub(crate) async fn drain(&self) {
        loop {
            let next = self.inner.cleanups.lock().pop_or_close();
            let Some(cleanup) = next else { break };
            self.run_one(cleanup).await;
        }
    }

    async fn run_one(&self, cleanup: Cleanup) {
        let label = cleanup.label.clone();
        match cleanup.run().await {
            Ok(()) => {}
            Err(CleanupFault::Failed(error)) => {
                tracing::warn!(scope = %self.path(), cleanup = %label, %error, "cleanup failed");
                self.publish(
                    Event::new(EventKind::CleanupFailed)
                        .with_subject(label.as_ref())
                        .with_reason(error),
                );
            }
            Err(CleanupFault::Panicked(info)) => {
                tracing::warn!(scope = %self.path(), cleanup = %label, panic = %info, "cleanup panicked");
                self.publish(
                    Event::new(EventKind::CleanupPanicked)
                        .with_subject(label.as_ref())
                        .with_reason(info),
                );
            }
        }
    }

    /// Publishes the outcome and hands failures up to the parent.
    pub(crate) fn conclude(&self) -> bool {
        let failures = self.inner.failures.lock().clone();
        if !self.failed() {
            self.publish(Event::new(EventKind::ScopePassed));
            return true;
        }

        let first = failures.first().map(|f| f.message.clone()).unwrap_or_default();
        self.publish(Event::new(EventKind::ScopeFailed).with_reason(first));
        if let Some(parent) = self.parent() {
            parent.inner.failed.store(true, Ordering::SeqCst);
            parent.inner.failures.lock().extend(failures);
        }
        false
    }

    /// Drains in the background when a run future is dropped before completing.
    pub(crate) fn drain_detached(&self) {
        let pending = self.pending_cleanups();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(scope = %self.path(), pending, "scope dropped before completion; draining in background");
                let scope = self.clone();
                handle.spawn(async move {
                    scope.drain().await;
                    scope.conclude();
                });
            }
            Err(_) if pending == 0 => {
                self.inner.cleanups.lock().pop_or_close();
            }
            Err(_) => {
                tracing::error!(scope = %self.path(), pending, "scope dropped outside a runtime; cleanups leaked");
                self.publish(Event::new(EventKind::CleanupLeaked).with_reason(format!("{pending} cleanups")));
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("path", &self.path())
            .field("failed", &self.failed())
            .field("pending_cleanups", &self.pending_cleanups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_join_names() {
        let root = Scope::root("suite");
        let child = root.child("redis");
        let grandchild = child.child("get");

        assert_eq!(grandchild.path(), "suite/redis/get");
        assert_eq!(grandchild.name(), "get");
        assert_eq!(grandchild.parent().map(Scope::path), Some("suite/redis"));
        assert!(root.parent().is_none());
    }

    #[tokio::test]
    async fn finish_reports_recorded_failures() {
        let root = Scope::root("suite");
        root.fail("first");
        root.fail("second");

        let err = root.finish().await.expect_err("scope failed");
        assert_eq!(err.scope, "suite");
        assert_eq!(err.failures, ["suite: first", "suite: second"]);
    }

    #[tokio::test]
    async fn cleanup_after_finish_runs_immediately() {
        let root = Scope::root("suite");
        let keep = root.clone();
        root.finish().await.expect("no failures");

        let (tx, rx) = tokio::sync::oneshot::channel();
        keep.cleanup("late", move || async move {
            let _ = tx.send(());
        });
        rx.await.expect("late cleanup ran");
    }

    #[tokio::test]
    async fn failed_cleanup_does_not_fail_scope() {
        let root = Scope::root("suite");
        root.cleanup("broken", || async { Err::<(), _>("refused") });
        assert!(root.finish().await.is_ok());
    }
}
