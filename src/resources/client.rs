//! # Service clients bound to provisioned instances.
//!
//! [`ServiceClientFactory`] composes a [`ContainerFactory`] with a "produce a
//! connected client" step; [`ClientFactory`] builds a fresh client per scope against
//! a fixed endpoint, without starting anything.
//!
//! ## Cleanup order
//! ```text
//! register: release(instance), close(client)
//! drain:    close(client), release(instance)
//! ```
//! The client is always closed before the instance it addresses is released.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Scope;
use crate::error::{ClientError, ProvisionError, ResolutionError};
use crate::events::{Event, EventKind};
use crate::factories::DepFactory;
use crate::resources::container::ContainerFactory;
use crate::resources::managed::ResourceRef;
use crate::resources::runtime::{Endpoint, RuntimeRef};
use crate::resources::spec::ContainerPort;

/// Connection options whose endpoint can be overridden.
pub trait ClientOptions: Clone + fmt::Debug + Send + Sync + 'static {
    /// Points the options at `endpoint`.
    fn set_endpoint(&mut self, endpoint: &Endpoint);

    /// The configured endpoint, if any.
    fn endpoint(&self) -> Option<Endpoint>;
}

/// # A client for one service kind.
///
/// Only the "construct with an address, confirm reachable" part is needed here;
/// everything else is the client library's business.
#[async_trait]
pub trait ServiceClient: Sized + Send + Sync + 'static {
    /// Connection options.
    type Options: ClientOptions;

    /// Connects and confirms the endpoint is reachable.
    async fn connect(options: Self::Options) -> Result<Self, ClientError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), ClientError>;
}

/// Connects a client and registers its close on `scope`.
async fn connect_in<C: ServiceClient>(scope: &Scope, options: C::Options) -> Result<Arc<C>, ProvisionError> {
    let label = options
        .endpoint()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let client = match C::connect(options).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(scope = %scope.path(), endpoint = %label, error = %e, "client failed to connect");
            return Err(e.into());
        }
    };
    scope.publish(Event::new(EventKind::ClientConnected).with_subject(label.as_str()));

    let closing = Arc::clone(&client);
    let owner = scope.clone();
    scope.cleanup(format!("close client {label}"), move || async move {
        let closed = closing.close().await;
        owner.publish(Event::new(EventKind::ClientClosed).with_subject(label.as_str()));
        closed
    });
    Ok(client)
}

/// Factory starting an instance and returning a client connected to it.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use depscope::{Scope, ServiceClientFactory};
/// use depscope::clients::{TcpClient, TcpOptions};
/// use depscope::runtimes::DockerCli;
/// use depscope::services::Redis;
///
/// # #[tokio::main]
/// # async fn main() {
/// let redis = ServiceClientFactory::<TcpClient>::new(
///     Arc::new(DockerCli::new()),
///     Arc::new(Redis::new("redis:7")),
///     TcpOptions::default(),
/// );
///
/// let root = Scope::root("suite");
/// root.run_with("ping", &redis, |_scope, client: Arc<TcpClient>| async move {
///     assert!(client.endpoint().port > 0);
/// }).await;
/// root.finish().await.unwrap();
/// # }
/// ```
pub struct ServiceClientFactory<C: ServiceClient> {
    container: ContainerFactory,
    options: C::Options,
    port: Option<ContainerPort>,
}

impl<C: ServiceClient> ServiceClientFactory<C> {
    /// Creates a factory; the options' endpoint is overridden per instance.
    pub fn new(runtime: RuntimeRef, resource: ResourceRef, options: C::Options) -> Self {
        Self {
            container: ContainerFactory::new(runtime, resource),
            options,
            port: None,
        }
    }

    /// Connects to `port` instead of the resource's client port.
    pub fn with_port(mut self, port: impl Into<ContainerPort>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// The underlying container factory.
    pub fn container(&self) -> &ContainerFactory {
        &self.container
    }
}

#[async_trait]
impl<C: ServiceClient> DepFactory<Arc<C>> for ServiceClientFactory<C> {
    fn name(&self) -> &str {
        "ServiceClientFactory"
    }

    async fn build(&self, scope: &Scope) -> Result<Arc<C>, ProvisionError> {
        let instance = self.container.start_in(scope).await?;

        let port = self
            .port
            .or_else(|| self.container.resource().client_port())
            .ok_or_else(|| ResolutionError::PortNotExposed {
                port: "<none>".to_string(),
            })?;
        let endpoint = instance.endpoint(port).await?;
        tracing::debug!(scope = %scope.path(), %port, %endpoint, "resolved client endpoint");

        let mut options = self.options.clone();
        options.set_endpoint(&endpoint);
        connect_in::<C>(scope, options).await
    }
}

/// Factory returning a fresh client per scope for fixed options.
pub struct ClientFactory<C: ServiceClient> {
    options: C::Options,
}

impl<C: ServiceClient> ClientFactory<C> {
    /// Creates a factory for `options`.
    ///
    /// # Errors
    /// [`ClientError::NoEndpoint`] if the options carry no endpoint.
    pub fn new(options: C::Options) -> Result<Self, ClientError> {
        if options.endpoint().is_none() {
            return Err(ClientError::NoEndpoint);
        }
        Ok(Self { options })
    }
}

#[async_trait]
impl<C: ServiceClient> DepFactory<Arc<C>> for ClientFactory<C> {
    fn name(&self) -> &str {
        "ClientFactory"
    }

    async fn build(&self, scope: &Scope) -> Result<Arc<C>, ProvisionError> {
        connect_in::<C>(scope, self.options.clone()).await
    }
}
