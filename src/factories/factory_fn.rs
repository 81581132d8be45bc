//! # Function-backed factory (`FactoryFn`)
//!
//! [`FactoryFn`] wraps a closure `F: Fn(Scope) -> Fut`, producing a fresh future
//! (and a fresh value) per build. Nothing is shared between builds unless the
//! closure captures it explicitly (e.g. an `Arc<...>` cloned into each future).
//!
//! ## Example
//! ```rust
//! use depscope::{FactoryFn, FactoryRef, Scope};
//!
//! let f: FactoryRef<Vec<String>> = FactoryFn::arc("names", |scope: Scope| async move {
//!     scope.cleanup("forget names", || async {});
//!     Ok(vec!["a".to_string()])
//! });
//!
//! assert_eq!(f.name(), "names");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Scope;
use crate::error::ProvisionError;
use crate::factories::factory::DepFactory;

/// Function-backed factory implementation.
#[derive(Debug)]
pub struct FactoryFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FactoryFn<F> {
    /// Creates a new function-backed factory.
    ///
    /// Prefer [`FactoryFn::arc`] when you immediately need a [`FactoryRef`](crate::FactoryRef).
    pub fn new<D, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Scope) -> Fut,
        Fut: Future<Output = Result<D, ProvisionError>>,
    {
        Self { name: name.into(), f }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc<D, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(Scope) -> Fut,
        Fut: Future<Output = Result<D, ProvisionError>>,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<D, F, Fut> DepFactory<D> for FactoryFn<F>
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<D, ProvisionError>> + Send + 'static,
    D: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn build(&self, scope: &Scope) -> Result<D, ProvisionError> {
        (self.f)(scope.clone()).await
    }
}
