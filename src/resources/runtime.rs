//! # Runtime boundary: turning a start specification into a running instance.
//!
//! [`ResourceRuntime`] is the seam to whatever actually creates isolated execution
//! environments (a container engine, a local process launcher). The crate ships
//! two adapters in [`runtimes`](crate::runtimes); tests plug in their own.
//!
//! ```text
//! ResourceRuntime::start(&spec)
//!   ├─ launch(&spec)            → InstanceRef (running, maybe not ready)
//!   ├─ await_ready(wait)        → Ok | NotReady | Exited
//!   └─ on failure, panic or cancellation: terminate()
//!                               → the half-started instance never leaks
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::core::panic_message;
use crate::error::{ReleaseError, ResolutionError, StartError};
use crate::resources::spec::{ContainerPort, StartSpec};
use crate::resources::wait::{ReadinessConfig, await_ready};

/// Coarse state of an instance, for diagnostics and early exit detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    /// The instance is running.
    Running,
    /// The instance stopped, with its exit status when known.
    Exited(Option<i32>),
    /// The runtime could not tell.
    Unknown,
}

/// Externally reachable address of an exposed port.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// Mapped port on `host`.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Handle to a realized start specification.
///
/// Exclusively owned by the scope that started it and released only through that
/// scope's cleanup.
#[async_trait]
pub trait RunningInstance: Send + Sync + 'static {
    /// Opaque runtime id (container id, process id).
    fn id(&self) -> &str;

    /// Image or program identity the instance was started from.
    fn image(&self) -> &str;

    /// Externally reachable host.
    async fn host(&self) -> Result<String, ResolutionError>;

    /// Externally reachable port for an internal port.
    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, ResolutionError>;

    /// Combined output captured so far.
    async fn logs(&self) -> std::io::Result<String>;

    /// Current state.
    async fn state(&self) -> InstanceState;

    /// Requests termination and frees the instance's resources.
    async fn terminate(&self) -> Result<(), ReleaseError>;

    /// Host and mapped port of `port`.
    async fn endpoint(&self, port: ContainerPort) -> Result<Endpoint, ResolutionError> {
        let host = self.host().await?;
        let port = self.mapped_port(port).await?;
        Ok(Endpoint { host, port })
    }
}

/// Shared handle to a running instance.
pub type InstanceRef = Arc<dyn RunningInstance>;

/// Creates running, ready instances from start specifications.
#[async_trait]
pub trait ResourceRuntime: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Readiness settings used by [`ResourceRuntime::start`].
    fn readiness(&self) -> &ReadinessConfig;

    /// Launches an instance without waiting for readiness.
    ///
    /// # Errors
    /// [`StartError::ImageNotFound`], [`StartError::PortConflict`] or
    /// [`StartError::Launch`] when the environment cannot launch it.
    async fn launch(&self, spec: &StartSpec) -> Result<InstanceRef, StartError>;

    /// Launches an instance and blocks until its readiness wait holds.
    ///
    /// The wait is bounded by `spec.startup_timeout`, or the runtime's
    /// [`ReadinessConfig::timeout`]. On any readiness failure the instance is
    /// terminated before the error is returned. A panicking readiness check terminates it
    /// before the panic resumes, and dropping the returned future mid-wait
    /// terminates it in the background.
    ///
    /// # Errors
    /// Launch errors, [`StartError::NotReady`] or [`StartError::Exited`].
    async fn start(&self, spec: &StartSpec) -> Result<InstanceRef, StartError> {
        let instance = self.launch(spec).await?;
        let guard = TerminateOnDrop::arm(Arc::clone(&instance));
        let cfg = self.readiness();
        let timeout = spec.startup_timeout.unwrap_or(cfg.timeout);

        let waited = AssertUnwindSafe(await_ready(instance.as_ref(), &spec.wait, cfg, timeout))
            .catch_unwind()
            .await;
        guard.disarm();

        let err = match waited {
            Ok(Ok(())) => {
                tracing::debug!(image = %spec.image, id = instance.id(), runtime = self.name(), "instance ready");
                return Ok(instance);
            }
            Ok(Err(e)) => e,
            Err(panic) => {
                tracing::warn!(image = %spec.image, id = instance.id(), panic = %panic_message(panic.as_ref()), "readiness check panicked; terminating");
                terminate_quietly(instance.as_ref()).await;
                std::panic::resume_unwind(panic);
            }
        };

        tracing::warn!(image = %spec.image, id = instance.id(), error = %err, "instance never became ready; terminating");
        terminate_quietly(instance.as_ref()).await;
        Err(err)
    }
}

async fn terminate_quietly(instance: &dyn RunningInstance) {
    if let Err(e) = instance.terminate().await {
        tracing::warn!(image = instance.image(), id = instance.id(), error = %e, "terminating unready instance failed");
    }
}

/// Terminates a launched instance if the start is abandoned before readiness settles.
///
/// Dropping an armed guard spawns `terminate()` on the current tokio runtime.
struct TerminateOnDrop {
    instance: Option<InstanceRef>,
}

impl TerminateOnDrop {
    fn arm(instance: InstanceRef) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    fn disarm(mut self) {
        self.instance = None;
    }
}

impl Drop for TerminateOnDrop {
    fn drop(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(image = instance.image(), id = instance.id(), "start abandoned; terminating instance");
                handle.spawn(async move { terminate_quietly(instance.as_ref()).await });
            }
            Err(_) => {
                tracing::error!(image = instance.image(), id = instance.id(), "start abandoned outside a runtime; instance leaked");
            }
        }
    }
}

/// Shared handle to a runtime.
pub type RuntimeRef = Arc<dyn ResourceRuntime>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_brackets_ipv6_hosts() {
        assert_eq!(Endpoint::new("localhost", 6379).to_string(), "localhost:6379");
        assert_eq!(Endpoint::new("::1", 5432).to_string(), "[::1]:5432");
    }
}
