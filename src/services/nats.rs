use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::resources::{ContainerPort, LogPattern, ManagedResource, ReadinessWait, SpecHook, StartSpec};

static SERVER_READY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*Server is ready").expect("valid regex"));

/// NATS message broker with JetStream enabled.
#[derive(Clone)]
pub struct Nats {
    image: String,
    hooks: Vec<SpecHook>,
}

impl Nats {
    /// Client port.
    pub const CLIENT_PORT: ContainerPort = ContainerPort::tcp(4222);
    /// Cluster routing port.
    pub const ROUTING_PORT: ContainerPort = ContainerPort::tcp(6222);
    /// HTTP monitoring port.
    pub const MONITORING_PORT: ContainerPort = ContainerPort::tcp(8222);

    /// Creates a resource for `image` (e.g. `nats:2.10`).
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

impl ManagedResource for Nats {
    fn specification(&self) -> StartSpec {
        StartSpec::new(self.image.as_str())
            .with_port(Self::CLIENT_PORT)
            .with_port(Self::ROUTING_PORT)
            .with_port(Self::MONITORING_PORT)
            .with_cmd(["--js"])
            .with_wait(ReadinessWait::Log {
                pattern: LogPattern::Regex(SERVER_READY.clone()),
                occurrences: 1,
            })
            .apply(&self.hooks)
    }

    fn client_port(&self) -> Option<ContainerPort> {
        Some(Self::CLIENT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enables_jetstream_and_exposes_three_ports() {
        let spec = Nats::new("nats:2.10").specification();
        assert_eq!(spec.cmd, ["--js"]);
        assert_eq!(spec.ports.len(), 3);
        assert!(matches!(spec.wait, ReadinessWait::Log { pattern: LogPattern::Regex(_), .. }));
    }
}
