//! # depscope
//!
//! **depscope** provisions test dependencies per scope: a test declares "this test
//! needs a fresh X", receives a freshly built X, and every resource it pulled in
//! (in-process values, local processes, containers) is released when the test
//! concludes, whether it passed, failed or panicked.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────────────────┐    ┌──────────────────────┐
//!  │ FactoryFn / FactoryMap │    │ ServiceClientFactory │
//!  │  (in-process values)   │    │  (connected clients) │
//!  └──────────┬─────────────┘    └──────────┬───────────┘
//!             │                             ▼
//!             │                  ┌──────────────────────┐
//!             │                  │   ContainerFactory   │
//!             │                  │ ManagedResource spec │
//!             │                  └──────────┬───────────┘
//!             │                             ▼
//!             │                  ┌──────────────────────┐
//!             │                  │   ResourceRuntime    │──► DockerCli / ProcessRuntime
//!             │                  │ launch + await_ready │
//!             │                  └──────────┬───────────┘
//!             ▼                             ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Scope::run(name, factory, body)                              │
//! │  child scope ─► factory.build(&child) ─► body(child, deps)   │
//! │  ─► drain cleanups (LIFO, isolated) ─► propagate outcome     │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼ publish(Event)
//!                  ┌──────────────────────────┐
//!                  │ Bus (broadcast channel)  │
//!                  └────────────┬─────────────┘
//!                               ▼
//!                  Harness listener ──► SubscriberSet ──► LogWriter / custom
//! ```
//!
//! ### Lifecycle of one nested run
//! ```text
//! parent.run("name", Some(&factory), body)
//!   ├─► child = parent/name, publish ScopeStarted
//!   ├─► deps = factory.build(&child)        (registers its own cleanups)
//!   │       └─ Err / panic ─► child failed, body skipped
//!   ├─► body(child, deps)                   (Err / panic / fail() ─► child failed)
//!   ├─► drain child cleanups, newest first  (faults reported, drain continues)
//!   └─► publish ScopePassed | ScopeFailed, failed child fails parent, return bool
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Scopes**        | Nested runs with guaranteed LIFO cleanup.                     | [`Scope`], [`Harness`], [`Outcome`]         |
//! | **Factories**     | Build dependencies inside a scope, compose them.              | [`DepFactory`], [`FactoryFn`], [`FactoryMap`] |
//! | **Resources**     | Start, await and release external services.                   | [`ManagedResource`], [`ResourceRuntime`], [`ReadinessWait`] |
//! | **Clients**       | Connected clients closed before their instance is released.   | [`ServiceClientFactory`], [`ServiceClient`] |
//! | **Subscriber API**| Hook into lifecycle events.                                   | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for start, resolution, release and clients.      | [`ProvisionError`], [`StartError`]          |
//! | **Configuration** | Harness and readiness settings.                               | [`Config`], [`ReadinessConfig`]             |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//! - `postgres`: exports `clients::PgClient` (sqlx pool).
//!
//! ## Example
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use depscope::{FactoryFn, FactoryRef, Scope};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), depscope::ScopeFailure> {
//!     // A fresh map per run, cleared when the run ends.
//!     let accumulator: FactoryRef<Arc<parking_lot::Mutex<HashMap<String, u32>>>> =
//!         FactoryFn::arc("accumulator", |scope: Scope| async move {
//!             let map = Arc::new(parking_lot::Mutex::new(HashMap::new()));
//!             let clear = Arc::clone(&map);
//!             scope.cleanup("clear", move || async move { clear.lock().clear() });
//!             Ok(map)
//!         });
//!
//!     let root = Scope::root("suite");
//!     for word in ["a", "b", "c"] {
//!         root.run(word, Some(&accumulator), move |_scope, map: Arc<parking_lot::Mutex<HashMap<String, u32>>>| async move {
//!             map.lock().insert(word.to_string(), 1);
//!             assert_eq!(map.lock().len(), 1);
//!         })
//!         .await;
//!     }
//!     root.finish().await
//! }
//! ```

pub mod clients;
mod core;
mod error;
mod events;
mod factories;
mod policies;
mod resources;
pub mod runtimes;
pub mod services;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Config, Harness, HarnessBuilder, Outcome, STRICT_RELEASE, Scope};
pub use error::{ClientError, ProvisionError, ReleaseError, ResolutionError, ScopeFailure, StartError};
pub use events::{Bus, Event, EventKind};
pub use factories::{AnyDep, AnyDeps, AnyFactoryMap, DepFactory, FactoryFn, FactoryMap, FactoryRef, FactorySeq, erase};
pub use policies::{JitterPolicy, PollPolicy};
pub use resources::{
    ClientFactory, ClientOptions, ContainerFactory, ContainerPort, CustomResource, Endpoint, InstanceRef,
    InstanceState, KEEP_INSTANCES, LogPattern, ManagedResource, Protocol, READINESS_TIMEOUT_ENV, ReadinessCheck,
    ReadinessConfig, ReadinessWait, ResourceRef, ResourceRuntime, RunningInstance, RuntimeRef, ServiceClient,
    ServiceClientFactory, SpecHook, StartSpec, await_ready,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
