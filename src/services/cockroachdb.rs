use std::sync::Arc;

use crate::resources::{ContainerPort, ManagedResource, ReadinessWait, SpecHook, StartSpec};

/// CockroachDB distributed SQL store, single node, insecure mode.
#[derive(Clone)]
pub struct CockroachDb {
    image: String,
    hooks: Vec<SpecHook>,
}

impl CockroachDb {
    /// SQL port.
    pub const SQL_PORT: ContainerPort = ContainerPort::tcp(26257);
    /// HTTP admin port, serving `/health`.
    pub const HTTP_PORT: ContainerPort = ContainerPort::tcp(8080);

    /// Creates a resource for `image` (e.g. `cockroachdb/cockroach:latest-v23.1`).
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

impl ManagedResource for CockroachDb {
    fn specification(&self) -> StartSpec {
        StartSpec::new(self.image.as_str())
            .with_port(Self::SQL_PORT)
            .with_port(Self::HTTP_PORT)
            .with_cmd(["start-single-node", "--insecure"])
            .with_wait(ReadinessWait::http("/health", Self::HTTP_PORT))
            .apply(&self.hooks)
    }

    fn client_port(&self) -> Option<ContainerPort> {
        Some(Self::SQL_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_checks_the_admin_port() {
        let spec = CockroachDb::new("cockroachdb/cockroach").specification();
        assert_eq!(spec.cmd, ["start-single-node", "--insecure"]);
        assert!(matches!(
            spec.wait,
            ReadinessWait::Http { port, ref path, status: 200 } if port == CockroachDb::HTTP_PORT && path == "/health"
        ));
    }
}
