//! # Readiness waits.
//!
//! A freshly started instance is running but not necessarily accepting traffic.
//! [`ReadinessWait`] describes the predicate that decides when it is ready;
//! [`await_ready`] probes it until it holds, the instance exits, or the bounded
//! timeout elapses.
//!
//! ## Probe loop
//! ```text
//! loop {
//!   probe(wait) ── Ok ──────────────────────────────► ready
//!        │
//!        └─ Err(reason) → last = reason
//!                         instance exited? ─ yes ──► StartError::Exited
//!                         sleep(poll.delay(n))
//! }
//! timeout elapsed ──────────────────────────────────► StartError::NotReady { last }
//! ```
//!
//! ## Rules
//! - A failed probe is never fatal; only the overall timeout (or the instance
//!   exiting) ends the wait.
//! - `All` holds only when every member holds in the same probe round.
//! - Each single probe is bounded by [`ReadinessConfig::probe_timeout`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use regex::Regex;
use tokio::net::TcpStream;

use crate::error::StartError;
use crate::policies::PollPolicy;
use crate::resources::runtime::{InstanceState, RunningInstance};
use crate::resources::spec::ContainerPort;

/// Environment variable overriding [`ReadinessConfig::timeout`] (whole seconds).
pub const READINESS_TIMEOUT_ENV: &str = "DEPSCOPE_READINESS_TIMEOUT_SECS";

/// User-defined readiness probe, e.g. reconnect-and-ping.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use depscope::{ReadinessCheck, RunningInstance};
///
/// struct Pong;
///
/// #[async_trait]
/// impl ReadinessCheck for Pong {
///     async fn check(&self, instance: &dyn RunningInstance) -> Result<(), String> {
///         let logs = instance.logs().await.map_err(|e| e.to_string())?;
///         if logs.contains("PONG") { Ok(()) } else { Err("no PONG yet".into()) }
///     }
/// }
/// ```
#[async_trait]
pub trait ReadinessCheck: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// One probe attempt: `Ok` once ready, `Err(reason)` otherwise.
    async fn check(&self, instance: &dyn RunningInstance) -> Result<(), String>;
}

/// What a log wait looks for.
#[derive(Clone, Debug)]
pub enum LogPattern {
    /// Plain substring.
    Substring(String),
    /// Regular expression.
    Regex(Regex),
}

impl LogPattern {
    fn count(&self, logs: &str) -> usize {
        match self {
            LogPattern::Substring(s) => logs.matches(s.as_str()).count(),
            LogPattern::Regex(re) => re.find_iter(logs).count(),
        }
    }
}

impl fmt::Display for LogPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogPattern::Substring(s) => write!(f, "{s:?}"),
            LogPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Predicate deciding when a started instance is ready.
#[derive(Clone)]
pub enum ReadinessWait {
    /// The instance output contains `pattern` at least `occurrences` times.
    Log {
        /// Substring or regex.
        pattern: LogPattern,
        /// Required number of matches (min 1).
        occurrences: usize,
    },
    /// A TCP connection to the mapped port succeeds.
    Port(ContainerPort),
    /// An HTTP GET on the mapped port answers with `status`.
    Http {
        /// Internal port serving HTTP.
        port: ContainerPort,
        /// Request path, e.g. `/health`.
        path: String,
        /// Expected status code.
        status: u16,
    },
    /// A user-defined probe.
    Check(Arc<dyn ReadinessCheck>),
    /// Every member holds.
    All(Vec<ReadinessWait>),
    /// Ready as soon as launched.
    Immediate,
}

impl ReadinessWait {
    /// Waits for a log line containing `substring`.
    pub fn log(substring: impl Into<String>) -> Self {
        ReadinessWait::Log {
            pattern: LogPattern::Substring(substring.into()),
            occurrences: 1,
        }
    }

    /// Waits for a log match of `pattern`.
    ///
    /// # Errors
    /// Returns the regex compilation error for an invalid pattern.
    pub fn log_regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(ReadinessWait::Log {
            pattern: LogPattern::Regex(Regex::new(pattern)?),
            occurrences: 1,
        })
    }

    /// Requires `n` log matches instead of one. No effect on other variants.
    pub fn times(self, n: usize) -> Self {
        match self {
            ReadinessWait::Log { pattern, .. } => ReadinessWait::Log {
                pattern,
                occurrences: n.max(1),
            },
            other => other,
        }
    }

    /// Waits until the port accepts TCP connections.
    pub fn port(port: impl Into<ContainerPort>) -> Self {
        ReadinessWait::Port(port.into())
    }

    /// Waits until `GET <path>` on `port` answers `200`.
    pub fn http(path: impl Into<String>, port: impl Into<ContainerPort>) -> Self {
        ReadinessWait::Http {
            port: port.into(),
            path: path.into(),
            status: 200,
        }
    }

    /// Expects `status` instead of `200`. No effect on other variants.
    pub fn with_status(self, status: u16) -> Self {
        match self {
            ReadinessWait::Http { port, path, .. } => ReadinessWait::Http { port, path, status },
            other => other,
        }
    }

    /// Waits on a user-defined check.
    pub fn check(check: impl ReadinessCheck) -> Self {
        ReadinessWait::Check(Arc::new(check))
    }

    /// Waits until every member holds.
    pub fn all(waits: impl IntoIterator<Item = ReadinessWait>) -> Self {
        ReadinessWait::All(waits.into_iter().collect())
    }

    fn probe<'a>(
        &'a self,
        instance: &'a dyn RunningInstance,
        ctx: &'a ProbeContext,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            match self {
                ReadinessWait::Immediate => Ok(()),
                ReadinessWait::Log { pattern, occurrences } => {
                    let logs = instance.logs().await.map_err(|e| format!("logs: {e}"))?;
                    let seen = pattern.count(&logs);
                    if seen >= *occurrences {
                        Ok(())
                    } else {
                        Err(format!("log {pattern} seen {seen}/{occurrences}"))
                    }
                }
                ReadinessWait::Port(port) => {
                    let addr = address(instance, *port).await?;
                    match tokio::time::timeout(ctx.probe_timeout, TcpStream::connect(&addr)).await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err(e)) => Err(format!("connect {addr}: {e}")),
                        Err(_) => Err(format!("connect {addr}: timed out")),
                    }
                }
                ReadinessWait::Http { port, path, status } => {
                    let url = format!("http://{}{}", address(instance, *port).await?, path);
                    let resp = ctx.http.get(&url).send().await.map_err(|e| format!("GET {url}: {e}"))?;
                    if resp.status().as_u16() == *status {
                        Ok(())
                    } else {
                        Err(format!("GET {url}: status {} (want {status})", resp.status().as_u16()))
                    }
                }
                ReadinessWait::Check(check) => {
                    match tokio::time::timeout(ctx.probe_timeout, check.check(instance)).await {
                        Ok(res) => res.map_err(|e| format!("{}: {e}", check.name())),
                        Err(_) => Err(format!("{}: timed out", check.name())),
                    }
                }
                ReadinessWait::All(waits) => {
                    for wait in waits {
                        wait.probe(instance, ctx).await?;
                    }
                    Ok(())
                }
            }
        })
    }
}

impl fmt::Debug for ReadinessWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessWait::Log { pattern, occurrences } => f
                .debug_struct("Log")
                .field("pattern", &pattern.to_string())
                .field("occurrences", occurrences)
                .finish(),
            ReadinessWait::Port(port) => f.debug_tuple("Port").field(&port.to_string()).finish(),
            ReadinessWait::Http { port, path, status } => f
                .debug_struct("Http")
                .field("port", &port.to_string())
                .field("path", path)
                .field("status", status)
                .finish(),
            ReadinessWait::Check(check) => f.debug_tuple("Check").field(&check.name()).finish(),
            ReadinessWait::All(waits) => f.debug_tuple("All").field(waits).finish(),
            ReadinessWait::Immediate => f.write_str("Immediate"),
        }
    }
}

async fn address(instance: &dyn RunningInstance, port: ContainerPort) -> Result<String, String> {
    instance
        .endpoint(port)
        .await
        .map(|endpoint| endpoint.to_string())
        .map_err(|e| e.to_string())
}

/// Readiness settings of a runtime.
///
/// ## Field semantics
/// - `timeout`: bound on the whole wait (override per spec with
///   [`StartSpec::with_startup_timeout`](crate::StartSpec::with_startup_timeout))
/// - `poll`: pause between probes
/// - `probe_timeout`: bound on one TCP/HTTP/custom probe
#[derive(Clone, Debug)]
pub struct ReadinessConfig {
    /// Bound on the whole readiness wait.
    pub timeout: Duration,
    /// Pause between probes.
    pub poll: PollPolicy,
    /// Bound on one probe.
    pub probe_timeout: Duration,
}

impl Default for ReadinessConfig {
    /// Default configuration:
    ///
    /// - `timeout = 60s`
    /// - `poll = PollPolicy::default()`
    /// - `probe_timeout = 2s`
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll: PollPolicy::default(),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl ReadinessConfig {
    /// Defaults with `timeout` read from `DEPSCOPE_READINESS_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = std::env::var(READINESS_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            cfg.timeout = Duration::from_secs(secs);
        }
        cfg
    }
}

struct ProbeContext {
    http: reqwest::Client,
    probe_timeout: Duration,
}

/// Probes `wait` against `instance` until it holds.
///
/// # Errors
/// - [`StartError::NotReady`] when `timeout` elapses, carrying the last probe outcome;
/// - [`StartError::Exited`] when the instance stops while waiting;
/// - [`StartError::Launch`] when the HTTP client cannot be built.
pub async fn await_ready(
    instance: &dyn RunningInstance,
    wait: &ReadinessWait,
    cfg: &ReadinessConfig,
    timeout: Duration,
) -> Result<(), StartError> {
    let http = reqwest::Client::builder()
        .timeout(cfg.probe_timeout)
        .build()
        .map_err(|e| StartError::Launch { error: e.to_string() })?;
    let ctx = ProbeContext {
        http,
        probe_timeout: cfg.probe_timeout,
    };

    let mut last = String::from("no probe completed");
    let waiting = async {
        let mut attempt: u32 = 0;
        loop {
            match wait.probe(instance, &ctx).await {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    tracing::trace!(instance = instance.id(), attempt, %reason, "not ready yet");
                    last = reason;
                }
            }
            if let InstanceState::Exited(status) = instance.state().await {
                let detail = match instance.logs().await {
                    Ok(logs) => tail(&logs, 20),
                    Err(e) => format!("logs unavailable: {e}"),
                };
                return Err(StartError::Exited { status, detail });
            }
            tokio::time::sleep(cfg.poll.delay(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    };

    let outcome = tokio::time::timeout(timeout, waiting).await;
    match outcome {
        Ok(res) => res,
        Err(_) => Err(StartError::NotReady { timeout, last }),
    }
}

/// Last `lines` lines of `logs`.
pub(crate) fn tail(logs: &str, lines: usize) -> String {
    let all: Vec<&str> = logs.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{ReleaseError, ResolutionError};

    struct Scripted {
        host: &'static str,
        logs: Mutex<String>,
        exited: bool,
    }

    impl Scripted {
        fn new(logs: &str) -> Self {
            Self {
                host: "127.0.0.1",
                logs: Mutex::new(logs.to_string()),
                exited: false,
            }
        }
    }

    #[async_trait]
    impl RunningInstance for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }

        fn image(&self) -> &str {
            "scripted:latest"
        }

        async fn host(&self) -> Result<String, ResolutionError> {
            Ok(self.host.into())
        }

        async fn mapped_port(&self, port: ContainerPort) -> Result<u16, ResolutionError> {
            Ok(port.number())
        }

        async fn logs(&self) -> std::io::Result<String> {
            let mut logs = self.logs.lock();
            logs.push_str("tick\n");
            Ok(logs.clone())
        }

        async fn state(&self) -> InstanceState {
            if self.exited {
                InstanceState::Exited(Some(3))
            } else {
                InstanceState::Running
            }
        }

        async fn terminate(&self) -> Result<(), ReleaseError> {
            Ok(())
        }
    }

    fn fast() -> ReadinessConfig {
        ReadinessConfig {
            timeout: Duration::from_secs(5),
            poll: PollPolicy::constant(Duration::from_millis(5)),
            probe_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn log_occurrences_accumulate_across_probes() {
        let inst = Scripted::new("");
        let wait = ReadinessWait::log("tick").times(3);
        await_ready(&inst, &wait, &fast(), Duration::from_secs(2))
            .await
            .expect("third probe sees three ticks");
    }

    #[tokio::test]
    async fn never_ready_times_out_with_last_reason() {
        let inst = Scripted::new("");
        let wait = ReadinessWait::log("Ready to accept connections");
        let err = await_ready(&inst, &wait, &fast(), Duration::from_millis(60))
            .await
            .expect_err("never ready");

        match err {
            StartError::NotReady { timeout, last } => {
                assert_eq!(timeout, Duration::from_millis(60));
                assert!(last.contains("seen 0/1"), "{last}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn exited_instance_fails_fast() {
        let inst = Scripted {
            host: "127.0.0.1",
            logs: Mutex::new("fatal: bad config\n".into()),
            exited: true,
        };
        let err = await_ready(&inst, &ReadinessWait::log("ready"), &fast(), Duration::from_secs(5))
            .await
            .expect_err("exited");
        assert!(matches!(err, StartError::Exited { status: Some(3), ref detail } if detail.contains("bad config")));
    }

    #[tokio::test]
    async fn all_requires_every_member() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let inst = Scripted::new("Waiting for connections\n");

        let ok = ReadinessWait::all([ReadinessWait::log("Waiting for connections"), ReadinessWait::port(port)]);
        await_ready(&inst, &ok, &fast(), Duration::from_secs(2)).await.expect("both hold");

        let never = ReadinessWait::all([ReadinessWait::port(port), ReadinessWait::log("never printed")]);
        let err = await_ready(&inst, &never, &fast(), Duration::from_millis(50))
            .await
            .expect_err("log member never holds");
        assert!(err.is_not_ready());
    }

    #[tokio::test]
    async fn readiness_address_brackets_ipv6_hosts() {
        let v4 = Scripted::new("");
        assert_eq!(address(&v4, ContainerPort::tcp(5432)).await.as_deref(), Ok("127.0.0.1:5432"));

        let v6 = Scripted {
            host: "::1",
            ..Scripted::new("")
        };
        assert_eq!(address(&v6, ContainerPort::tcp(5432)).await.as_deref(), Ok("[::1]:5432"));
    }

    #[test]
    fn regex_waits_match_partial_lines() {
        let wait = ReadinessWait::log_regex(".*Server is ready").expect("valid regex");
        let ReadinessWait::Log { pattern, occurrences } = wait else {
            panic!("log wait expected");
        };
        assert_eq!(occurrences, 1);
        assert_eq!(pattern.count("[1] 2024/01/01 [INF] Server is ready\n"), 1);
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("", 5), "");
    }
}
