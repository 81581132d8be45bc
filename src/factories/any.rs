//! # Runtime-typed dependency bag (opt-in).
//!
//! Typed factories ([`FactoryRef<D>`](crate::FactoryRef), [`FactoryMap`](crate::FactoryMap))
//! are the primary API. [`AnyDeps`] is for callers who prefer one heterogeneous bag
//! keyed by name and accept a checked downcast at the call site.
//!
//! ## Example
//! ```rust
//! use depscope::{AnyDeps, AnyFactoryMap, FactoryFn, FactoryRef, Scope};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let port: FactoryRef<u16> = FactoryFn::arc("port", |_s: Scope| async { Ok(6379u16) });
//! let host: FactoryRef<String> = FactoryFn::arc("host", |_s: Scope| async { Ok("localhost".to_string()) });
//! let bag = std::sync::Arc::new(AnyFactoryMap::new().with("port", port).with("host", host));
//!
//! let root = Scope::root("suite");
//! let passed = root.run_with("bag", &bag, |_s, deps: AnyDeps| async move {
//!     assert_eq!(*deps.get::<u16>("port")?, 6379);
//!     assert!(deps.get::<u32>("port").is_err());
//!     Ok::<_, depscope::ProvisionError>(())
//! }).await;
//! assert!(passed);
//! # }
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Scope;
use crate::error::ProvisionError;
use crate::factories::factory::{DepFactory, FactoryRef};
use crate::factories::map::FactoryMap;

/// Type-erased dependency value.
pub type AnyDep = Box<dyn Any + Send + Sync>;

struct Erased<V> {
    inner: FactoryRef<V>,
}

#[async_trait]
impl<V: Send + Sync + 'static> DepFactory<AnyDep> for Erased<V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn build(&self, scope: &Scope) -> Result<AnyDep, ProvisionError> {
        let value = self.inner.build(scope).await?;
        Ok(Box::new(value))
    }
}

/// Erases the value type of a factory.
pub fn erase<V: Send + Sync + 'static>(factory: FactoryRef<V>) -> FactoryRef<AnyDep> {
    Arc::new(Erased { inner: factory })
}

/// Heterogeneous dependencies keyed by name.
#[derive(Default)]
pub struct AnyDeps {
    values: HashMap<String, AnyDep>,
}

impl AnyDeps {
    /// Borrows the value under `key` as a `T`.
    ///
    /// # Errors
    /// [`ProvisionError::Dependency`] if the key is missing or holds another type.
    pub fn get<T: 'static>(&self, key: &str) -> Result<&T, ProvisionError> {
        let value = self.values.get(key).ok_or_else(|| missing(key))?;
        value.downcast_ref::<T>().ok_or_else(|| mistyped::<T>(key))
    }

    /// Removes the value under `key` and returns it as a `T`.
    ///
    /// A value of another type is left in place.
    ///
    /// # Errors
    /// [`ProvisionError::Dependency`] if the key is missing or holds another type.
    pub fn take<T: 'static>(&mut self, key: &str) -> Result<T, ProvisionError> {
        if !self.values.get(key).ok_or_else(|| missing(key))?.is::<T>() {
            return Err(mistyped::<T>(key));
        }
        let value = self.values.remove(key).ok_or_else(|| missing(key))?;
        value.downcast::<T>().map(|b| *b).map_err(|_| mistyped::<T>(key))
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn missing(key: &str) -> ProvisionError {
    ProvisionError::Dependency {
        key: key.to_string(),
        error: "missing".to_string(),
    }
}

fn mistyped<T>(key: &str) -> ProvisionError {
    ProvisionError::Dependency {
        key: key.to_string(),
        error: format!("not a {}", type_name::<T>()),
    }
}

/// Factory for an [`AnyDeps`] bag, one erased factory per key.
#[derive(Default)]
pub struct AnyFactoryMap {
    inner: FactoryMap<String, AnyDep>,
}

impl AnyFactoryMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the factory for `key`, erasing its value type.
    pub fn with<V: Send + Sync + 'static>(mut self, key: impl Into<String>, factory: FactoryRef<V>) -> Self {
        self.inner.insert(key.into(), erase(factory));
        self
    }
}

#[async_trait]
impl DepFactory<AnyDeps> for AnyFactoryMap {
    fn name(&self) -> &str {
        "AnyFactoryMap"
    }

    async fn build(&self, scope: &Scope) -> Result<AnyDeps, ProvisionError> {
        let values = self.inner.build(scope).await?;
        Ok(AnyDeps { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_leaves_mistyped_values_in_place() {
        let mut deps = AnyDeps::default();
        deps.values.insert("n".to_string(), Box::new(7u8));

        assert!(deps.take::<String>("n").is_err());
        assert!(deps.contains("n"));
        assert_eq!(deps.take::<u8>("n").expect("u8"), 7);
        assert!(deps.is_empty());
        assert!(matches!(deps.get::<u8>("n"), Err(ProvisionError::Dependency { .. })));
    }
}
