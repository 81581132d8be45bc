//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] hands each [`Event`] to every subscriber's bounded queue and
//! returns without awaiting any of them.
//!
//! ## Guarantees
//! - `emit(&Event)` never blocks a scope.
//! - Per-subscriber FIFO.
//! - A panicking subscriber keeps receiving events; the panic is logged.
//!
//! ## Non-guarantees
//! - No ordering across subscribers.
//! - Overflowing events are dropped for that subscriber and counted
//!   ([`SubscriberSet::dropped`]).
//!
//! ## Self-reporting
//! A set created by a [`Harness`](crate::Harness) reports overflows and panics
//! back on the harness bus as [`EventKind::SubscriberOverflow`] and
//! [`EventKind::SubscriberPanicked`]. Faults raised while handling one of those
//! reports are only logged, so a broken subscriber cannot feed itself.
//!
//! ```text
//!    emit(&Event) ──┬──► [queue S1] ─► worker S1 ─► on_event()
//!                   ├──► [queue S2] ─► worker S2 ─► on_event()
//!                   └──► [queue SN] ─► worker SN ─► on_event()
//!                              │ full / panic
//!                              └──► Bus (SubscriberOverflow / SubscriberPanicked)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

fn is_report(kind: EventKind) -> bool {
    matches!(kind, EventKind::SubscriberOverflow | EventKind::SubscriberPanicked)
}

struct Queue {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

/// Fan-out to subscribers through per-subscriber queues and workers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    reports: Option<Bus>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime when `subs` is non-empty.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::spawn(subs, None)
    }

    /// Like [`SubscriberSet::new`], reporting overflows and panics on `bus`.
    pub(crate) fn reporting(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        Self::spawn(subs, Some(bus))
    }

    fn spawn(subs: Vec<Arc<dyn Subscribe>>, reports: Option<Bus>) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            workers.push(tokio::spawn(worker(Arc::clone(&sub), rx, reports.clone())));
            queues.push(Queue {
                sub,
                tx,
                dropped: AtomicU64::new(0),
            });
        }

        Self {
            queues,
            workers,
            reports,
        }
    }

    /// Queues `event` for every subscriber that accepts it.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for queue in self.queues.iter().filter(|q| q.sub.accepts(event)) {
            let reason = match queue.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            queue.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(subscriber = queue.sub.name(), reason, kind = ?event.kind, "dropped event");

            if let Some(bus) = self.reports.as_ref().filter(|_| !is_report(event.kind)) {
                bus.publish(
                    Event::new(EventKind::SubscriberOverflow)
                        .with_subject(queue.sub.name())
                        .with_reason(reason),
                );
            }
        }
    }

    /// Events dropped so far, per subscriber name.
    pub fn dropped(&self) -> Vec<(&'static str, u64)> {
        self.queues
            .iter()
            .map(|q| (q.sub.name(), q.dropped.load(Ordering::Relaxed)))
            .collect()
    }

    /// Closes every queue and waits for the workers to finish what is queued.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }
}

async fn worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, reports: Option<Bus>) {
    while let Some(ev) = rx.recv().await {
        let Err(panic) = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await else {
            continue;
        };
        let info = panic_message(panic.as_ref());
        tracing::error!(subscriber = sub.name(), kind = ?ev.kind, panic = %info, "subscriber panicked");

        if let Some(bus) = reports.as_ref().filter(|_| !is_report(ev.kind)) {
            bus.publish(
                Event::new(EventKind::SubscriberPanicked)
                    .with_subject(sub.name())
                    .with_reason(info),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    struct Recorder(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber blew up");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    struct Stuck;

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bus = Bus::new(16);
        let mut reports = bus.subscribe();
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Exploding), Arc::new(Recorder(Arc::clone(&seen)))];
        let set = SubscriberSet::reporting(subs, bus);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::ScopeStarted));
        set.emit(&Event::new(EventKind::ScopePassed));
        set.shutdown().await;

        assert_eq!(*seen.lock(), [EventKind::ScopeStarted, EventKind::ScopePassed]);
        let report = reports.recv().await.expect("panic reported");
        assert_eq!(report.kind, EventKind::SubscriberPanicked);
        assert_eq!(report.subject.as_deref(), Some("exploding"));
    }

    struct FailuresOnly(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for FailuresOnly {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }

        fn accepts(&self, event: &Event) -> bool {
            matches!(event.kind, EventKind::ScopeFailed | EventKind::ReleaseFailed)
        }
    }

    #[tokio::test]
    async fn rejected_events_are_not_queued() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(FailuresOnly(Arc::clone(&seen)))];
        let set = SubscriberSet::new(subs);

        set.emit(&Event::new(EventKind::ScopeStarted));
        set.emit(&Event::new(EventKind::ReleaseFailed));
        set.emit(&Event::new(EventKind::ScopePassed));
        set.shutdown().await;

        assert_eq!(*seen.lock(), [EventKind::ReleaseFailed]);
    }

    #[tokio::test]
    async fn overflow_is_counted_and_reported_once() {
        let bus = Bus::new(16);
        let mut reports = bus.subscribe();
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Stuck)];
        let set = SubscriberSet::reporting(subs, bus);

        // First event is taken by the worker, the second fills the queue.
        set.emit(&Event::new(EventKind::ScopeStarted));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        set.emit(&Event::new(EventKind::ScopeStarted));
        set.emit(&Event::new(EventKind::ScopePassed));
        set.emit(&Event::new(EventKind::SubscriberOverflow));

        assert_eq!(set.dropped(), [("stuck", 2)]);
        let report = reports.try_recv().expect("overflow reported");
        assert_eq!(report.kind, EventKind::SubscriberOverflow);
        assert_eq!(report.reason.as_deref(), Some("full"));
        assert!(reports.try_recv().is_err(), "reports are not re-reported");
    }
}
