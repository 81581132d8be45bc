//! # Lifecycle events emitted by scopes, factories and the cleanup drain.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Scope events**: a nested run started, passed or failed
//! - **Cleanup events**: a deferred action failed, panicked or leaked
//! - **Resource events**: a managed resource is starting, ready, failed, released
//! - **Client events**: a service client connected or closed
//!
//! The [`Event`] struct carries additional metadata such as timestamps, scope path,
//! subject (resource image, cleanup label, client endpoint) and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use depscope::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReleaseFailed)
//!     .with_scope("suite/redis")
//!     .with_subject("redis:7")
//!     .with_reason("daemon unavailable");
//!
//! assert_eq!(ev.kind, EventKind::ReleaseFailed);
//! assert_eq!(ev.scope.as_deref(), Some("suite/redis"));
//! assert_eq!(ev.reason.as_deref(), Some("daemon unavailable"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subject`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subject`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Scope events ===
    /// A nested run created its child scope.
    ///
    /// Sets:
    /// - `scope`: path of the child scope
    ScopeStarted,

    /// A scope finished without recorded failures.
    ///
    /// Sets:
    /// - `scope`: path of the scope
    ScopePassed,

    /// A scope finished with at least one recorded failure.
    ///
    /// Sets:
    /// - `scope`: path of the scope
    /// - `reason`: first recorded failure
    ScopeFailed,

    // === Cleanup events ===
    /// A cleanup action returned an error. The drain continued.
    ///
    /// Sets:
    /// - `scope`: path of the draining scope
    /// - `subject`: cleanup label
    /// - `reason`: error message
    CleanupFailed,

    /// A cleanup action panicked. The drain continued.
    ///
    /// Sets:
    /// - `scope`: path of the draining scope
    /// - `subject`: cleanup label
    /// - `reason`: panic message
    CleanupPanicked,

    /// A cleanup was registered on a finished scope, or a scope was dropped
    /// where no runtime could drain it.
    ///
    /// Sets:
    /// - `scope`: path of the scope
    /// - `subject`: cleanup label (when known)
    CleanupLeaked,

    // === Resource events ===
    /// A managed resource is being started.
    ///
    /// Sets:
    /// - `scope`, `subject`: image identity
    ResourceStarting,

    /// A managed resource passed its readiness wait.
    ///
    /// Sets:
    /// - `scope`, `subject`: image identity
    /// - `reason`: runtime id of the instance
    ResourceReady,

    /// A managed resource could not be started or never became ready.
    ///
    /// Sets:
    /// - `scope`, `subject`: image identity
    /// - `reason`: start error message
    /// - `timeout_ms`: readiness timeout (only for `NotReady`)
    ResourceStartFailed,

    /// A managed resource was released.
    ///
    /// Sets:
    /// - `scope`, `subject`: image identity
    ResourceReleased,

    /// Releasing a managed resource failed (warning only).
    ///
    /// Sets:
    /// - `scope`, `subject`: image identity
    /// - `reason`: release error message
    ReleaseFailed,

    // === Client events ===
    /// A service client connected to its endpoint.
    ///
    /// Sets:
    /// - `scope`, `subject`: endpoint
    ClientConnected,

    /// A service client was closed.
    ///
    /// Sets:
    /// - `scope`, `subject`: endpoint
    ClientClosed,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Path of the scope the event belongs to.
    pub scope: Option<Arc<str>>,
    /// What the event is about: image, cleanup label, endpoint or subscriber name.
    pub subject: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Readiness timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            scope: None,
            subject: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a scope path.
    #[inline]
    pub fn with_scope(mut self, scope: impl Into<Arc<str>>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attaches the subject of the event.
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subject(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subject(subscriber)
            .with_reason(info)
    }

    /// True for events that describe a failure somewhere in the lifecycle.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ScopeFailed
                | EventKind::CleanupFailed
                | EventKind::CleanupPanicked
                | EventKind::CleanupLeaked
                | EventKind::ResourceStartFailed
                | EventKind::ReleaseFailed
                | EventKind::SubscriberPanicked
        )
    }
}
