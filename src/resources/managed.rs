//! # Managed resources.
//!
//! A [`ManagedResource`] is anything that can be provisioned for a scope: it knows
//! how to describe its start ([`ManagedResource::specification`]) and how to release
//! an instance. Per-service implementations live in [`services`](crate::services);
//! [`CustomResource`] wraps a hand-written [`StartSpec`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReleaseError;
use crate::resources::runtime::InstanceRef;
use crate::resources::spec::{ContainerPort, SpecHook, StartSpec};

/// # Capability contract of a provisionable external resource.
///
/// # Example
/// ```
/// use depscope::{ContainerPort, ManagedResource, ReadinessWait, StartSpec};
///
/// struct Memcached;
///
/// impl ManagedResource for Memcached {
///     fn specification(&self) -> StartSpec {
///         StartSpec::new("memcached:1.6")
///             .with_port(ContainerPort::tcp(11211))
///             .with_wait(ReadinessWait::port(11211u16))
///     }
/// }
///
/// assert_eq!(Memcached.client_port(), Some(ContainerPort::tcp(11211)));
/// ```
#[async_trait]
pub trait ManagedResource: Send + Sync + 'static {
    /// Describes how to start one instance.
    ///
    /// Must be pure: the same resource always yields the same spec.
    fn specification(&self) -> StartSpec;

    /// Internal port a client connects to. Defaults to the first exposed port.
    fn client_port(&self) -> Option<ContainerPort> {
        self.specification().ports.first().copied()
    }

    /// Releases an instance. Defaults to terminating it.
    ///
    /// A failure is reported as a warning and does not fail the scope unless
    /// [`Config::strict_release`](crate::Config::strict_release) is set.
    async fn release(&self, instance: InstanceRef) -> Result<(), ReleaseError> {
        instance.terminate().await
    }
}

/// Shared handle to a resource.
pub type ResourceRef = Arc<dyn ManagedResource>;

/// Resource described by a fixed start specification.
#[derive(Clone)]
pub struct CustomResource {
    spec: StartSpec,
    client_port: Option<ContainerPort>,
    hooks: Vec<SpecHook>,
}

impl CustomResource {
    /// Wraps `spec`.
    pub fn new(spec: StartSpec) -> Self {
        Self {
            spec,
            client_port: None,
            hooks: Vec::new(),
        }
    }

    /// Overrides the client port (defaults to the first exposed port).
    pub fn with_client_port(mut self, port: impl Into<ContainerPort>) -> Self {
        self.client_port = Some(port.into());
        self
    }

    /// Adds a customization hook.
    pub fn with_hook(mut self, hook: impl Fn(&mut StartSpec) + Send + Sync + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }
}

impl ManagedResource for CustomResource {
    fn specification(&self) -> StartSpec {
        self.spec.clone().apply(&self.hooks)
    }

    fn client_port(&self) -> Option<ContainerPort> {
        self.client_port
            .or_else(|| self.specification().ports.first().copied())
    }
}
