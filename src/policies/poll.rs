//! # Poll policy for readiness probes.
//!
//! [`PollPolicy`] controls the pause between two readiness probes of a starting
//! instance. The delay for probe `n` is `first × factor^n`, clamped to `max`, then
//! jitter is applied. The base is derived from the probe number alone, so jitter
//! never accumulates across probes.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use depscope::{JitterPolicy, PollPolicy};
//!
//! let poll = PollPolicy {
//!     first: Duration::from_millis(50),
//!     max: Duration::from_millis(400),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(poll.delay(0), Duration::from_millis(50));
//! assert_eq!(poll.delay(2), Duration::from_millis(200));
//! assert_eq!(poll.delay(9), Duration::from_millis(400));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay schedule between readiness probes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first failed probe.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant cadence).
    pub factor: f64,
    /// Randomization applied to every delay.
    pub jitter: JitterPolicy,
}

impl Default for PollPolicy {
    /// Returns a policy tuned for service startup:
    /// - `first = 100ms`;
    /// - `factor = 1.5`;
    /// - `max = 1s`;
    /// - `jitter = Equal`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 1.5,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl PollPolicy {
    /// A constant cadence without jitter.
    pub fn constant(every: Duration) -> Self {
        Self {
            first: every,
            max: every,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the pause after probe number `probe` (0-indexed).
    ///
    /// Non-finite or negative intermediate values fall back to `max`.
    pub fn delay(&self, probe: u32) -> Duration {
        let exp = probe.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        self.jitter.apply(base)
    }
}
