use std::sync::Arc;

use crate::resources::{ContainerPort, ManagedResource, ReadinessWait, SpecHook, StartSpec};

/// MongoDB document store.
#[derive(Clone)]
pub struct MongoDb {
    image: String,
    hooks: Vec<SpecHook>,
}

impl MongoDb {
    /// Internal port clients connect to.
    pub const PORT: ContainerPort = ContainerPort::tcp(27017);

    /// Creates a resource for `image` (e.g. `mongo:7`).
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

impl ManagedResource for MongoDb {
    fn specification(&self) -> StartSpec {
        StartSpec::new(self.image.as_str())
            .with_port(Self::PORT)
            .with_wait(ReadinessWait::all([
                ReadinessWait::log("Waiting for connections"),
                ReadinessWait::port(Self::PORT),
            ]))
            .apply(&self.hooks)
    }

    fn client_port(&self) -> Option<ContainerPort> {
        Some(Self::PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_log_and_port() {
        let spec = MongoDb::new("mongo:7").specification();
        let ReadinessWait::All(waits) = spec.wait else {
            panic!("expected a composite wait");
        };
        assert_eq!(waits.len(), 2);
        assert!(matches!(waits[1], ReadinessWait::Port(p) if p == MongoDb::PORT));
    }
}
