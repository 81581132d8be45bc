//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`] for handling lifecycle events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Scope ── publish(Event) ──► Bus ──► Harness listener ──► SubscriberSet::emit
//!                                                                 │
//!                                                   ┌─────────────┼─────────────┐
//!                                                   ▼             ▼             ▼
//!                                               LogWriter      Metrics       Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use depscope::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct LeakAlarm;
//!
//! #[async_trait]
//! impl Subscribe for LeakAlarm {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ReleaseFailed {
//!             // page someone: a container may still be running
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "leak-alarm"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
