//! # Harness configuration.
//!
//! Provides [`Config`], the settings shared by every scope created from one
//! [`Harness`](crate::Harness).
//!
//! ## Environment
//! [`Config::from_env`] starts from the defaults and applies:
//! - `DEPSCOPE_STRICT_RELEASE=1|true` → [`Config::strict_release`]
//! - `DEPSCOPE_BUS_CAPACITY=<n>` → [`Config::bus_capacity`]
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::sync::LazyLock;

/// Whether release failures fail the owning scope, read once from `DEPSCOPE_STRICT_RELEASE`.
pub static STRICT_RELEASE: LazyLock<bool> = LazyLock::new(|| env_flag("DEPSCOPE_STRICT_RELEASE"));

/// Configuration shared by all scopes of a harness.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `strict_release`: escalate [`ReleaseError`](crate::ReleaseError)s to scope failures
/// - `separator`: joins scope names into report paths (`suite/redis/get`)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Escalate release failures to failures of the owning scope.
    ///
    /// Off by default: a teardown failure after a passing test is logged as a
    /// warning and the test stays green. Turn it on where instances are reused
    /// between runs and a failed teardown would leak state into the next run.
    pub strict_release: bool,

    /// Separator used to build scope paths from nested names.
    pub separator: &'static str,
}

impl Config {
    /// Defaults overridden by `DEPSCOPE_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.strict_release = *STRICT_RELEASE;
        if let Some(cap) = std::env::var("DEPSCOPE_BUS_CAPACITY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            cfg.bus_capacity = cap;
        }
        cfg
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `strict_release = false`
    /// - `separator = "/"`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            strict_release: false,
            separator: "/",
        }
    }
}

/// Reads a boolean flag: `1` or `true` (any case) enable it.
pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_do_not_escalate_release_failures() {
        let cfg = Config::default();
        assert!(!cfg.strict_release);
        assert_eq!(cfg.separator, "/");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn missing_flag_reads_false() {
        assert!(!env_flag("DEPSCOPE_TEST_FLAG_THAT_IS_NEVER_SET"));
    }
}
