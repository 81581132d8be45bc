//! Error types used by scopes, factories, runtimes and clients.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`StartError`]: a resource could not be launched or never became ready.
//! - [`ResolutionError`]: the endpoint of a started instance could not be determined.
//! - [`ReleaseError`]: teardown failed (logged, never escalated by default).
//! - [`ClientError`]: a service client could not connect or close.
//! - [`ProvisionError`]: the umbrella error a [`DepFactory`](crate::DepFactory) returns.
//! - [`ScopeFailure`]: the outcome of a failed root scope.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging and events.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while starting a managed resource.
///
/// Fatal to the dependent scope only: the scope is marked failed and its body
/// never runs, siblings and the parent keep going.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StartError {
    /// The readiness predicate did not hold within the bounded timeout.
    #[error("not ready after {timeout:?}: {last}")]
    NotReady {
        /// The readiness timeout that elapsed.
        timeout: Duration,
        /// Outcome of the last readiness probe.
        last: String,
    },

    /// The runtime could not find (or pull) the requested image or program.
    #[error("image not found: {image}")]
    ImageNotFound {
        /// The image or program identity from the start specification.
        image: String,
    },

    /// A requested port could not be bound.
    #[error("port conflict: {detail}")]
    PortConflict {
        /// Runtime output describing the conflict.
        detail: String,
    },

    /// The instance exited before it became ready.
    #[error("exited before ready (status={status:?}): {detail}")]
    Exited {
        /// Exit status, when the runtime reports one.
        status: Option<i32>,
        /// Tail of the instance output.
        detail: String,
    },

    /// The runtime failed to launch the instance for any other reason.
    #[error("launch failed: {error}")]
    Launch {
        /// The underlying error message.
        error: String,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use depscope::StartError;
    /// use std::time::Duration;
    ///
    /// let err = StartError::NotReady { timeout: Duration::from_secs(1), last: "no log".into() };
    /// assert_eq!(err.as_label(), "start_not_ready");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::NotReady { .. } => "start_not_ready",
            StartError::ImageNotFound { .. } => "start_image_not_found",
            StartError::PortConflict { .. } => "start_port_conflict",
            StartError::Exited { .. } => "start_exited",
            StartError::Launch { .. } => "start_launch_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StartError::NotReady { timeout, last } => {
                format!("not ready within {timeout:?}; last probe: {last}")
            }
            StartError::ImageNotFound { image } => format!("image not found: {image}"),
            StartError::PortConflict { detail } => format!("port conflict: {detail}"),
            StartError::Exited { status, detail } => {
                format!("exited with status={status:?}: {detail}")
            }
            StartError::Launch { error } => format!("launch: {error}"),
        }
    }

    /// True if the instance was launched but never satisfied its readiness wait.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, StartError::NotReady { .. })
    }
}

/// # Errors produced while resolving the endpoint of a running instance.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    /// The port was never declared in the start specification.
    #[error("port {port} is not exposed")]
    PortNotExposed {
        /// The internal port that was requested.
        port: String,
    },

    /// The runtime has no host mapping for an exposed port.
    #[error("port {port} has no host mapping: {detail}")]
    PortNotMapped {
        /// The internal port that was requested.
        port: String,
        /// Runtime output describing the failure.
        detail: String,
    },

    /// A port string could not be parsed (`"6379"`, `"6379/tcp"`, `"53/udp"`).
    #[error("invalid port {port:?}")]
    InvalidPort {
        /// The rejected input.
        port: String,
    },

    /// The reachable host address could not be determined.
    #[error("host resolution failed: {error}")]
    Host {
        /// The underlying error message.
        error: String,
    },
}

impl ResolutionError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolutionError::PortNotExposed { .. } => "resolve_port_not_exposed",
            ResolutionError::PortNotMapped { .. } => "resolve_port_not_mapped",
            ResolutionError::InvalidPort { .. } => "resolve_invalid_port",
            ResolutionError::Host { .. } => "resolve_host",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced while releasing an instance.
///
/// A release failure is reported as a warning. It never flips the result of a
/// passing scope unless [`Config::strict_release`](crate::Config::strict_release) is set.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ReleaseError {
    /// The runtime refused or failed to terminate the instance.
    #[error("terminate {id} failed: {error}")]
    Terminate {
        /// Runtime id of the instance.
        id: String,
        /// The underlying error message.
        error: String,
    },
}

impl ReleaseError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReleaseError::Terminate { .. } => "release_terminate_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by service clients.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The client could not connect to (or confirm) its endpoint.
    #[error("connect to {endpoint} failed: {error}")]
    Connect {
        /// The endpoint the client was bound to.
        endpoint: String,
        /// The underlying error message.
        error: String,
    },

    /// Closing the client failed.
    #[error("close failed: {error}")]
    Close {
        /// The underlying error message.
        error: String,
    },

    /// The client options carry no endpoint.
    #[error("no endpoint configured")]
    NoEndpoint,
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Connect { .. } => "client_connect_failed",
            ClientError::Close { .. } => "client_close_failed",
            ClientError::NoEndpoint => "client_no_endpoint",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors returned by dependency factories.
///
/// Any `Err` returned by a factory marks the scope failed; the body is skipped
/// and every cleanup registered so far still runs.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    /// A managed resource failed to start.
    #[error("start: {0}")]
    Start(#[from] StartError),

    /// The endpoint of a started resource could not be resolved.
    #[error("resolve: {0}")]
    Resolution(#[from] ResolutionError),

    /// A service client could not be constructed.
    #[error("client: {0}")]
    Client(#[from] ClientError),

    /// A composed dependency was missing or had an unexpected type.
    #[error("dependency {key:?}: {error}")]
    Dependency {
        /// Key of the dependency.
        key: String,
        /// What went wrong.
        error: String,
    },

    /// Any other factory failure.
    #[error("{error}")]
    Other {
        /// The underlying error message.
        error: String,
    },
}

impl ProvisionError {
    /// Builds a [`ProvisionError::Other`] from any displayable error.
    pub fn other(error: impl std::fmt::Display) -> Self {
        ProvisionError::Other {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use depscope::{ClientError, ProvisionError};
    ///
    /// let err = ProvisionError::from(ClientError::NoEndpoint);
    /// assert_eq!(err.as_label(), "client_no_endpoint");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProvisionError::Start(e) => e.as_label(),
            ProvisionError::Resolution(e) => e.as_label(),
            ProvisionError::Client(e) => e.as_label(),
            ProvisionError::Dependency { .. } => "provision_dependency",
            ProvisionError::Other { .. } => "provision_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProvisionError::Start(e) => e.as_message(),
            ProvisionError::Resolution(e) => e.as_message(),
            ProvisionError::Client(e) => e.as_message(),
            other => other.to_string(),
        }
    }
}

/// # A root scope finished with recorded failures.
#[derive(Error, Debug, Clone)]
#[error("scope {scope:?} failed: {}", failures.join("; "))]
pub struct ScopeFailure {
    /// Path of the failed scope.
    pub scope: String,
    /// Every failure recorded in the scope (and reported up by failed children).
    pub failures: Vec<String>,
}

impl ScopeFailure {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        "scope_failed"
    }
}
