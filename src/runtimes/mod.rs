//! # Shipped runtime adapters.
//!
//! - [`DockerCli`] drives a container engine CLI (`docker` or `podman`).
//! - [`ProcessRuntime`] launches local programs; ports map to themselves.
//!
//! Both implement [`ResourceRuntime`](crate::ResourceRuntime) and inherit its
//! readiness handling.

mod docker;
mod process;

pub use docker::{DockerCli, MANAGED_LABEL};
pub use process::ProcessRuntime;
