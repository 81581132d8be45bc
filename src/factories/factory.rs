//! # Dependency factory abstraction.
//!
//! A [`DepFactory`] builds one value for a scope. It owns registering its own
//! cleanup on the scope it receives; the runner never infers cleanup from the
//! returned value. The common handle type is [`FactoryRef`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Scope;
use crate::error::ProvisionError;

/// # Builds dependencies for a scope.
///
/// Invoked once per [`Scope::run`](crate::Scope::run) with the freshly created child
/// scope. Anything that must be released when the scope ends is registered through
/// [`Scope::cleanup`].
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use depscope::{DepFactory, ProvisionError, Scope};
///
/// struct Counter(u32);
///
/// #[async_trait]
/// impl DepFactory<Vec<u32>> for Counter {
///     async fn build(&self, scope: &Scope) -> Result<Vec<u32>, ProvisionError> {
///         scope.cleanup("say bye", || async {});
///         Ok((0..self.0).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait DepFactory<D>: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Builds a fresh dependency value for `scope`.
    ///
    /// An `Err` marks the scope failed and skips its body; cleanups registered
    /// before the error still run.
    async fn build(&self, scope: &Scope) -> Result<D, ProvisionError>;
}

/// Shared handle to a factory.
pub type FactoryRef<D> = Arc<dyn DepFactory<D>>;

#[async_trait]
impl<D, T> DepFactory<D> for Arc<T>
where
    T: DepFactory<D> + ?Sized,
    D: Send + 'static,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn build(&self, scope: &Scope) -> Result<D, ProvisionError> {
        (**self).build(scope).await
    }
}
