use std::sync::Arc;

use crate::resources::{ContainerPort, ManagedResource, ReadinessWait, SpecHook, StartSpec};

/// Redis cache server.
#[derive(Clone)]
pub struct Redis {
    image: String,
    hooks: Vec<SpecHook>,
}

impl Redis {
    /// Internal port clients connect to.
    pub const PORT: ContainerPort = ContainerPort::tcp(6379);

    /// Creates a resource for `image` (e.g. `redis:7`).
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            hooks: Vec::new(),
        }
    }

    /// Adds a customization hook.
    pub fn with_hook(mut self, hook: impl Fn(&mut StartSpec) + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }
}

impl ManagedResource for Redis {
    fn specification(&self) -> StartSpec {
        StartSpec::new(self.image.as_str())
            .with_port(Self::PORT)
            .with_wait(ReadinessWait::log("Ready to accept connections"))
            .apply(&self.hooks)
    }

    fn client_port(&self) -> Option<ContainerPort> {
        Some(Self::PORT)
    }
}
