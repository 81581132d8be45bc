//! # Start specification of a managed resource.
//!
//! A [`StartSpec`] fully describes how to start one instance: image (or program)
//! identity, exposed ports, environment, command arguments, the readiness wait and
//! labels. It is produced by [`ManagedResource::specification`](crate::ManagedResource::specification),
//! adjusted by [`SpecHook`]s, and then handed to the runtime by reference, so it is
//! never mutated once a start begins.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use depscope::{ContainerPort, ReadinessWait, StartSpec};
//!
//! let spec = StartSpec::new("redis:7")
//!     .with_port(ContainerPort::tcp(6379))
//!     .with_env("REDIS_ARGS", "--save ''")
//!     .with_wait(ReadinessWait::log("Ready to accept connections"))
//!     .with_startup_timeout(Duration::from_secs(30));
//!
//! assert!(spec.exposes(&"6379/tcp".parse().unwrap()));
//! assert_eq!(spec.ports[0].to_string(), "6379/tcp");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ResolutionError;
use crate::resources::wait::ReadinessWait;

/// Transport protocol of an exposed port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// TCP (the default).
    Tcp,
    /// UDP.
    Udp,
}

/// Internal port of an instance, e.g. `6379/tcp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerPort {
    port: u16,
    protocol: Protocol,
}

impl ContainerPort {
    /// A TCP port.
    pub const fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }

    /// A UDP port.
    pub const fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Udp,
        }
    }

    /// Port number.
    pub fn number(&self) -> u16 {
        self.port
    }

    /// Protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl From<u16> for ContainerPort {
    fn from(port: u16) -> Self {
        ContainerPort::tcp(port)
    }
}

impl FromStr for ContainerPort {
    type Err = ResolutionError;

    /// Parses `"6379"`, `"6379/tcp"` or `"53/udp"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResolutionError::InvalidPort { port: s.to_string() };
        let (num, proto) = s.trim().split_once('/').unwrap_or((s.trim(), "tcp"));
        let port = num.parse::<u16>().map_err(|_| invalid())?;
        match proto.to_ascii_lowercase().as_str() {
            "tcp" => Ok(ContainerPort::tcp(port)),
            "udp" => Ok(ContainerPort::udp(port)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proto = match self.protocol {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        };
        write!(f, "{}/{}", self.port, proto)
    }
}

/// Customization applied to a spec before a start begins.
///
/// Hooks are how callers inject credentials or extra configuration without
/// subclassing a service (see [`Postgres::with_initial_database`](crate::services::Postgres::with_initial_database)).
pub type SpecHook = Arc<dyn Fn(&mut StartSpec) + Send + Sync>;

/// Immutable descriptor of how to start one instance.
#[derive(Clone, Debug)]
pub struct StartSpec {
    /// Image (container runtimes) or program (process runtime).
    pub image: String,
    /// Internal ports to expose, in declaration order.
    pub ports: Vec<ContainerPort>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Command arguments.
    pub cmd: Vec<String>,
    /// Predicate deciding when the instance accepts traffic.
    pub wait: ReadinessWait,
    /// Overrides the runtime's readiness timeout for this spec.
    pub startup_timeout: Option<Duration>,
    /// Labels attached to the instance (container runtimes).
    pub labels: BTreeMap<String, String>,
}

impl StartSpec {
    /// Creates a spec with no ports and an immediate readiness wait.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ports: Vec::new(),
            env: BTreeMap::new(),
            cmd: Vec::new(),
            wait: ReadinessWait::Immediate,
            startup_timeout: None,
            labels: BTreeMap::new(),
        }
    }

    /// Exposes an internal port (duplicates are ignored).
    pub fn with_port(mut self, port: impl Into<ContainerPort>) -> Self {
        let port = port.into();
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }

    /// Sets an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replaces the command arguments.
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the readiness wait.
    pub fn with_wait(mut self, wait: ReadinessWait) -> Self {
        self.wait = wait;
        self
    }

    /// Overrides the readiness timeout.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Adds a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Applies hooks in order.
    pub fn apply(mut self, hooks: &[SpecHook]) -> Self {
        for hook in hooks {
            hook(&mut self);
        }
        self
    }

    /// True if `port` is declared.
    pub fn exposes(&self, port: &ContainerPort) -> bool {
        self.ports.contains(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ports_with_and_without_protocol() {
        assert_eq!("6379".parse::<ContainerPort>().ok(), Some(ContainerPort::tcp(6379)));
        assert_eq!("8080/TCP".parse::<ContainerPort>().ok(), Some(ContainerPort::tcp(8080)));
        assert_eq!("53/udp".parse::<ContainerPort>().ok(), Some(ContainerPort::udp(53)));
        assert!(matches!(
            "http".parse::<ContainerPort>(),
            Err(ResolutionError::InvalidPort { .. })
        ));
        assert!("80/sctp".parse::<ContainerPort>().is_err());
    }

    #[test]
    fn hooks_run_in_order_on_a_copy() {
        let base = StartSpec::new("postgres:16").with_env("POSTGRES_USER", "postgres");
        let hooks: Vec<SpecHook> = vec![
            Arc::new(|s: &mut StartSpec| {
                s.env.insert("POSTGRES_USER".into(), "alice".into());
            }),
            Arc::new(|s: &mut StartSpec| {
                s.env.insert("POSTGRES_USER".into(), "bob".into());
            }),
        ];

        let applied = base.clone().apply(&hooks);
        assert_eq!(applied.env["POSTGRES_USER"], "bob");
        assert_eq!(base.env["POSTGRES_USER"], "postgres");
    }

    #[test]
    fn duplicate_ports_are_ignored() {
        let spec = StartSpec::new("nats").with_port(4222u16).with_port(ContainerPort::tcp(4222));
        assert_eq!(spec.ports.len(), 1);
    }
}
