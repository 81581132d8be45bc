//! # Subscriber trait
//!
//! [`Subscribe`] plugs custom handlers into a [`Harness`](crate::Harness). Every
//! subscriber gets its own worker and bounded queue inside the
//! [`SubscriberSet`](crate::SubscriberSet), so a slow or broken handler never
//! delays a scope's drain.
//!
//! ## Contract
//! - `on_event` may be slow; it only delays this subscriber's own queue.
//! - `accepts` is called on the publishing side and must be cheap; rejected events
//!   never occupy queue space.
//! - When the queue is full, events are dropped for this subscriber, counted and
//!   reported as [`EventKind::SubscriberOverflow`](crate::EventKind::SubscriberOverflow).

use async_trait::async_trait;

use crate::events::Event;

/// Handler for lifecycle events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether this subscriber wants `event` at all. Defaults to every event.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
