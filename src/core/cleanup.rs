//! # Cleanup stack of a scope.
//!
//! A [`CleanupStack`] holds deferred actions in registration order and hands
//! them back last-in-first-out. Once the stack has been popped empty it is
//! **closed**: later registrations are refused so the caller can deal with them
//! explicitly instead of parking them on a scope nobody will drain again.
//!
//! ```text
//! register c1, c2, c3 ──► [c1, c2, c3] ──► drain: c3, c2, c1 ──► closed
//! ```
//!
//! Each action runs isolated: an `Err` or a panic is turned into a
//! [`CleanupFault`] and the drain moves on to the next action.

use std::borrow::Cow;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::{outcome::Outcome, panic_message};

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// One deferred action plus a label for diagnostics.
pub(crate) struct Cleanup {
    pub(crate) label: Cow<'static, str>,
    action: Action,
}

/// Why a cleanup did not complete.
#[derive(Debug)]
pub(crate) enum CleanupFault {
    /// The action returned an error.
    Failed(String),
    /// The action panicked.
    Panicked(String),
}

impl Cleanup {
    pub(crate) fn new<F, Fut>(label: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Outcome,
    {
        Self {
            label: label.into(),
            action: Box::new(move || Box::pin(async move { f().await.into_result() })),
        }
    }

    /// Runs the action, catching panics raised while building or polling it.
    pub(crate) async fn run(self) -> Result<(), CleanupFault> {
        let action = self.action;
        match AssertUnwindSafe(async move { action().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CleanupFault::Failed(e)),
            Err(panic) => Err(CleanupFault::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

/// Append-only stack of cleanups, drained exactly once.
#[derive(Default)]
pub(crate) struct CleanupStack {
    actions: Vec<Cleanup>,
    closed: bool,
}

impl CleanupStack {
    /// Appends `cleanup`, or hands it back if the stack is already closed.
    pub(crate) fn push(&mut self, cleanup: Cleanup) -> Result<(), Cleanup> {
        if self.closed {
            return Err(cleanup);
        }
        self.actions.push(cleanup);
        Ok(())
    }

    /// Pops the most recent cleanup; closes the stack once it runs empty.
    pub(crate) fn pop_or_close(&mut self) -> Option<Cleanup> {
        let next = self.actions.pop();
        if next.is_none() {
            self.closed = true;
        }
        next
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}
