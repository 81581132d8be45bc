//! # Dependency factories and their composition helpers.
//!
//! This module provides the construction side of a scoped run:
//! - [`DepFactory`] - trait for building one dependency value inside a scope
//! - [`FactoryFn`] - closure-backed factory
//! - [`FactoryRef`] - shared handle to a factory (`Arc<dyn DepFactory<D>>`)
//! - [`FactoryMap`] / [`FactorySeq`] - aggregate several factories into one
//! - [`AnyDeps`] / [`AnyFactoryMap`] - opt-in, runtime-typed dependency bag

mod any;
mod factory;
mod factory_fn;
mod map;

pub use any::{AnyDep, AnyDeps, AnyFactoryMap, erase};
pub use factory::{DepFactory, FactoryRef};
pub use factory_fn::FactoryFn;
pub use map::{FactoryMap, FactorySeq};
