//! # Managed external resources.
//!
//! This module provides the lifecycle of external services bounded by a scope:
//! - [`StartSpec`] / [`ContainerPort`] / [`SpecHook`] - how to start one instance
//! - [`ReadinessWait`] / [`ReadinessConfig`] / [`await_ready`] - when it is ready
//! - [`ResourceRuntime`] / [`RunningInstance`] - the runtime boundary
//! - [`ManagedResource`] - the per-service capability contract
//! - [`ContainerFactory`] - one fresh instance per scope, released on drain
//! - [`ServiceClientFactory`] / [`ClientFactory`] - connected clients per scope

mod client;
mod container;
mod managed;
mod runtime;
mod spec;
mod wait;

pub use client::{ClientFactory, ClientOptions, ServiceClient, ServiceClientFactory};
pub use container::{ContainerFactory, KEEP_INSTANCES};
pub use managed::{CustomResource, ManagedResource, ResourceRef};
pub use runtime::{Endpoint, InstanceRef, InstanceState, ResourceRuntime, RunningInstance, RuntimeRef};
pub use spec::{ContainerPort, Protocol, SpecHook, StartSpec};
pub use wait::{LogPattern, READINESS_TIMEOUT_ENV, ReadinessCheck, ReadinessConfig, ReadinessWait, await_ready};

pub(crate) use wait::tail;
