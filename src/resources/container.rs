//! # Container factory: one fresh instance per scope.
//!
//! [`ContainerFactory`] adapts a [`ManagedResource`] and a [`ResourceRuntime`] into a
//! [`DepFactory`] of [`InstanceRef`].
//!
//! ## Flow
//! ```text
//! build(scope)
//!   ├─ spec = resource.specification()              → ResourceStarting
//!   ├─ runtime.start(&spec)
//!   │     ├─ Err(StartError) → ResourceStartFailed → Err(ProvisionError::Start)
//!   │     └─ Ok(instance)    → ResourceReady
//!   └─ scope.cleanup(release(instance))             → ResourceReleased | ReleaseFailed
//! ```
//!
//! ## Rules
//! - A start failure fails the dependent scope; its body never sees a half-started
//!   instance.
//! - A release failure is a warning (`tracing::warn!` + `ReleaseFailed`), never a
//!   scope failure, unless [`Config::strict_release`](crate::Config::strict_release).
//! - `DEPSCOPE_KEEP_INSTANCES=1` skips releases so instances can be inspected after
//!   a run.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;

use crate::core::{Scope, env_flag};
use crate::error::{ProvisionError, StartError};
use crate::events::{Event, EventKind};
use crate::factories::DepFactory;
use crate::resources::managed::{ManagedResource, ResourceRef};
use crate::resources::runtime::{InstanceRef, ResourceRuntime, RuntimeRef};

/// Skip releasing instances when `DEPSCOPE_KEEP_INSTANCES` is set, for debugging.
pub static KEEP_INSTANCES: LazyLock<bool> = LazyLock::new(|| env_flag("DEPSCOPE_KEEP_INSTANCES"));

/// Factory starting one instance of a resource per scope.
#[derive(Clone)]
pub struct ContainerFactory {
    runtime: RuntimeRef,
    resource: ResourceRef,
}

impl ContainerFactory {
    /// Creates a factory from shared handles.
    pub fn new(runtime: RuntimeRef, resource: ResourceRef) -> Self {
        Self { runtime, resource }
    }

    /// Creates a factory from owned values.
    pub fn of(runtime: impl ResourceRuntime, resource: impl ManagedResource) -> Self {
        Self::new(Arc::new(runtime), Arc::new(resource))
    }

    /// The resource this factory starts.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// The runtime this factory starts instances on.
    pub fn runtime(&self) -> &RuntimeRef {
        &self.runtime
    }

    /// Starts an instance and registers its release on `scope`.
    pub(crate) async fn start_in(&self, scope: &Scope) -> Result<InstanceRef, ProvisionError> {
        let spec = self.resource.specification();
        let image = spec.image.clone();
        scope.publish(Event::new(EventKind::ResourceStarting).with_subject(image.as_str()));

        let instance = match self.runtime.start(&spec).await {
            Ok(instance) => instance,
            Err(e) => {
                tracing::warn!(scope = %scope.path(), %image, label = e.as_label(), error = %e, "resource failed to start");
                let mut ev = Event::new(EventKind::ResourceStartFailed)
                    .with_subject(image.as_str())
                    .with_reason(e.as_message());
                if let StartError::NotReady { timeout, .. } = &e {
                    ev = ev.with_timeout(*timeout);
                }
                scope.publish(ev);
                return Err(e.into());
            }
        };

        scope.publish(
            Event::new(EventKind::ResourceReady)
                .with_subject(image.as_str())
                .with_reason(instance.id()),
        );

        let resource = Arc::clone(&self.resource);
        let released = Arc::clone(&instance);
        let owner = scope.clone();
        scope.cleanup(format!("release {image}"), move || async move {
            if *KEEP_INSTANCES {
                tracing::warn!(scope = %owner.path(), %image, id = released.id(), "keeping instance (DEPSCOPE_KEEP_INSTANCES)");
                return;
            }
            match resource.release(released).await {
                Ok(()) => owner.publish(Event::new(EventKind::ResourceReleased).with_subject(image.as_str())),
                Err(e) => {
                    tracing::warn!(scope = %owner.path(), %image, error = %e, "failed to release resource");
                    owner.publish(
                        Event::new(EventKind::ReleaseFailed)
                            .with_subject(image.as_str())
                            .with_reason(e.as_message()),
                    );
                    if owner.config().strict_release {
                        owner.fail(format!("release {image}: {}", e.as_message()));
                    }
                }
            }
        });

        Ok(instance)
    }
}

#[async_trait]
impl DepFactory<InstanceRef> for ContainerFactory {
    fn name(&self) -> &str {
        "ContainerFactory"
    }

    async fn build(&self, scope: &Scope) -> Result<InstanceRef, ProvisionError> {
        self.start_in(scope).await
    }
}
