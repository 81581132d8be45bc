//! Scoped runner core: scopes, cleanup stacks and the harness.
//!
//! The public API from this module is [`Scope`] (with [`Scope::run`] as the entry
//! point a test author uses), [`Harness`] / [`HarnessBuilder`], [`Config`] and
//! [`Outcome`].
//!
//! Internal modules:
//! - [`scope`]: the scope handle, failure recording, drain and outcome propagation;
//! - [`runner`]: runs one nested scope (factory, body, drain) with panic isolation;
//! - [`cleanup`]: the LIFO cleanup stack and isolated cleanup execution;
//! - [`harness`]: shared config/bus and the subscriber listener.

mod builder;
mod cleanup;
mod config;
mod harness;
mod outcome;
mod runner;
mod scope;

use std::any::Any;

pub use builder::HarnessBuilder;
pub use config::{Config, STRICT_RELEASE};
pub use harness::Harness;
pub use outcome::Outcome;
pub use scope::Scope;

pub(crate) use config::env_flag;

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
