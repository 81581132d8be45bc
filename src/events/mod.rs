//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by scopes, the cleanup drain, container
//! and client factories, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scope` (start/pass/fail, cleanup drain), `ContainerFactory`,
//!   `ServiceClientFactory`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Harness` listener (fans out to `SubscriberSet`) and any receiver
//!   obtained through [`Harness::subscribe`](crate::Harness::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
