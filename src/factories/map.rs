//! # Aggregating factories.
//!
//! - [`FactoryMap`] realizes a `HashMap<K, V>` from a mapping key → factory.
//!   Iteration order is unspecified; don't use it for factories whose side
//!   effects must happen in a particular order.
//! - [`FactorySeq`] realizes a `Vec<(K, V)>` from an ordered list of pairs, in
//!   declaration order.
//!
//! Both invoke every inner factory with the **same** scope, so all cleanups land
//! on one stack and drain together (reverse order of registration).
//!
//! ## Example
//! ```rust
//! use std::collections::HashMap;
//! use depscope::{FactoryFn, FactoryMap, FactoryRef, Scope};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let one: FactoryRef<u32> = FactoryFn::arc("one", |_s: Scope| async { Ok(1u32) });
//! let two: FactoryRef<u32> = FactoryFn::arc("two", |_s: Scope| async { Ok(2u32) });
//! let both: FactoryRef<HashMap<&str, u32>> =
//!     std::sync::Arc::new(FactoryMap::new().with("one", one).with("two", two));
//!
//! let root = Scope::root("suite");
//! let passed = root.run("sum", Some(&both), |_s, deps: HashMap<&str, u32>| async move {
//!     assert_eq!(deps.values().sum::<u32>(), 3);
//! }).await;
//! assert!(passed);
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::core::Scope;
use crate::error::ProvisionError;
use crate::factories::factory::{DepFactory, FactoryRef};

fn dependency_error<K: Debug>(key: &K, e: ProvisionError) -> ProvisionError {
    ProvisionError::Dependency {
        key: format!("{key:?}"),
        error: e.as_message(),
    }
}

/// Mapping of keys to factories, realized as a `HashMap`.
pub struct FactoryMap<K, V> {
    factories: HashMap<K, FactoryRef<V>>,
}

impl<K: Eq + Hash, V> FactoryMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds (or replaces) the factory for `key`.
    pub fn with(mut self, key: K, factory: FactoryRef<V>) -> Self {
        self.factories.insert(key, factory);
        self
    }

    /// Adds (or replaces) the factory for `key` in place.
    pub fn insert(&mut self, key: K, factory: FactoryRef<V>) {
        self.factories.insert(key, factory);
    }

    /// Number of factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if there are no factories.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for FactoryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, FactoryRef<V>)> for FactoryMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, FactoryRef<V>)>>(iter: I) -> Self {
        Self {
            factories: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<K, V> DepFactory<HashMap<K, V>> for FactoryMap<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    fn name(&self) -> &str {
        "FactoryMap"
    }

    async fn build(&self, scope: &Scope) -> Result<HashMap<K, V>, ProvisionError> {
        let mut out = HashMap::with_capacity(self.factories.len());
        for (key, factory) in &self.factories {
            let value = factory.build(scope).await.map_err(|e| dependency_error(key, e))?;
            out.insert(key.clone(), value);
        }
        Ok(out)
    }
}

/// Ordered sequence of `(key, factory)` pairs, realized in declaration order.
pub struct FactorySeq<K, V> {
    factories: Vec<(K, FactoryRef<V>)>,
}

impl<K, V> FactorySeq<K, V> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Appends a factory.
    pub fn with(mut self, key: K, factory: FactoryRef<V>) -> Self {
        self.factories.push((key, factory));
        self
    }

    /// Number of factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if there are no factories.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<K, V> Default for FactorySeq<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> DepFactory<Vec<(K, V)>> for FactorySeq<K, V>
where
    K: Clone + Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    fn name(&self) -> &str {
        "FactorySeq"
    }

    async fn build(&self, scope: &Scope) -> Result<Vec<(K, V)>, ProvisionError> {
        let mut out = Vec::with_capacity(self.factories.len());
        for (key, factory) in &self.factories {
            let value = factory.build(scope).await.map_err(|e| dependency_error(key, e))?;
            out.push((key.clone(), value));
        }
        Ok(out)
    }
}
