use std::sync::Arc;

use crate::core::{Config, Harness};
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Harness`] with optional subscribers.
pub struct HarnessBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl HarnessBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (scope outcomes, cleanup faults,
    /// resource starts and releases) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the harness.
    ///
    /// With subscribers configured this spawns their workers and the bus listener,
    /// so it must then be called from within a tokio runtime.
    pub fn build(self) -> Harness {
        Harness::new_internal(self.cfg, self.subscribers)
    }
}
