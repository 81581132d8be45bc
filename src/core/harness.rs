//! # Harness: shared configuration and event plumbing for root scopes.
//!
//! A [`Harness`] owns the [`Config`] and the event [`Bus`](crate::events::Bus) that
//! every scope created from it shares. When subscribers are configured it spawns one
//! listener that forwards bus events to the [`SubscriberSet`].
//!
//! ## Architecture
//! ```text
//! HarnessBuilder::build()
//!   ├─► Shared { Config, Bus }
//!   └─► listener (only with subscribers):
//!         Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Harness::root("suite") ─► Scope ─► run(..) ─► child scopes ─► publish(Event) ─► Bus
//! ```
//!
//! ## Example
//! ```rust
//! use depscope::{Config, Harness};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let harness = Harness::builder(Config::default()).build();
//! let root = harness.root("suite");
//!
//! let passed = root.run("answer", None, |_scope, n: u32| async move {
//!     assert_eq!(n, 0);
//! }).await;
//!
//! assert!(passed);
//! root.finish().await.expect("suite passed");
//! harness.shutdown().await;
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::HarnessBuilder;
use crate::core::config::Config;
use crate::core::scope::{Scope, Shared};
use crate::events::Event;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Entry point that hands out root scopes sharing one configuration and bus.
pub struct Harness {
    shared: Arc<Shared>,
    subs: Option<Arc<SubscriberSet>>,
    token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Harness {
    /// Returns a builder for a harness with the given configuration.
    pub fn builder(cfg: Config) -> HarnessBuilder {
        HarnessBuilder::new(cfg)
    }

    /// Creates a harness without subscribers.
    pub fn new(cfg: Config) -> Self {
        HarnessBuilder::new(cfg).build()
    }

    pub(crate) fn new_internal(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let shared = Shared::new(cfg);
        let subs = (!subscribers.is_empty())
            .then(|| Arc::new(SubscriberSet::reporting(subscribers, shared.bus.clone())));
        let harness = Self {
            shared,
            subs,
            token: CancellationToken::new(),
            listener: Mutex::new(None),
        };
        harness.subscriber_listener();
        harness
    }

    /// Creates a root scope.
    pub fn root(&self, name: impl Into<Arc<str>>) -> Scope {
        Scope::new_root(name.into(), Arc::clone(&self.shared))
    }

    /// Subscribes to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Configuration shared by this harness's scopes.
    pub fn config(&self) -> &Config {
        &self.shared.cfg
    }

    /// Stops forwarding events and waits for subscribers to drain their queues.
    pub async fn shutdown(self) {
        self.token.cancel();
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        if let Some(set) = self.subs.and_then(|subs| Arc::try_unwrap(subs).ok()) {
            set.shutdown().await;
        }
    }

    fn subscriber_listener(&self) {
        let Some(set) = self.subs.as_ref().filter(|s| !s.is_empty()).map(Arc::clone) else {
            return;
        };
        let mut rx = self.shared.bus.subscribe();
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
        });
        *self.listener.lock() = Some(handle);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
