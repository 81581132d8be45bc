//! Readiness polling policies.
//!
//! A readiness wait probes a freshly started instance repeatedly until its
//! predicate holds or the startup timeout elapses. This module controls **how
//! long** to sleep between two probes.
//!
//! ## Contents
//! - [`PollPolicy`] how probe delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization so parallel suites do not probe in lockstep
//!
//! ## Quick wiring
//! ```text
//! ReadinessConfig { timeout, poll: PollPolicy, probe_timeout }
//!      └─► resources::wait::await_ready uses poll.delay(attempt) between probes
//! ```
//!
//! ## Defaults
//! - `PollPolicy::default()` → first=100ms, factor=1.5, max=1s, jitter=Equal.

mod jitter;
mod poll;

pub use jitter::JitterPolicy;
pub use poll::PollPolicy;
