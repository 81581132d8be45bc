//! # LogWriter: event renderer over `tracing`
//!
//! A subscriber that renders incoming [`Event`]s as `tracing` records.
//! Failures are logged at `warn`, lifecycle milestones at `info`/`debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  depscope: [resource-starting] scope="suite/redis" image="redis:7"
//! INFO  depscope: [resource-ready] scope="suite/redis" image="redis:7" id="3f2a..."
//! WARN  depscope: [release-failed] scope="suite/redis" image="redis:7" err="..."
//! INFO  depscope: [scope-passed] scope="suite/redis"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let scope = e.scope.as_deref().unwrap_or("-");
        let subject = e.subject.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ScopeStarted => {
                tracing::debug!("[scope-started] scope={scope:?}");
            }
            EventKind::ScopePassed => {
                tracing::info!("[scope-passed] scope={scope:?}");
            }
            EventKind::ScopeFailed => {
                tracing::warn!("[scope-failed] scope={scope:?} err={reason:?}");
            }
            EventKind::CleanupFailed => {
                tracing::warn!("[cleanup-failed] scope={scope:?} cleanup={subject:?} err={reason:?}");
            }
            EventKind::CleanupPanicked => {
                tracing::warn!("[cleanup-panicked] scope={scope:?} cleanup={subject:?} info={reason:?}");
            }
            EventKind::CleanupLeaked => {
                tracing::warn!("[cleanup-leaked] scope={scope:?} cleanup={subject:?}");
            }
            EventKind::ResourceStarting => {
                tracing::info!("[resource-starting] scope={scope:?} image={subject:?}");
            }
            EventKind::ResourceReady => {
                tracing::info!("[resource-ready] scope={scope:?} image={subject:?} id={reason:?}");
            }
            EventKind::ResourceStartFailed => {
                tracing::warn!(
                    "[resource-start-failed] scope={scope:?} image={subject:?} timeout_ms={:?} err={reason:?}",
                    e.timeout_ms
                );
            }
            EventKind::ResourceReleased => {
                tracing::info!("[resource-released] scope={scope:?} image={subject:?}");
            }
            EventKind::ReleaseFailed => {
                tracing::warn!("[release-failed] scope={scope:?} image={subject:?} err={reason:?}");
            }
            EventKind::ClientConnected => {
                tracing::debug!("[client-connected] scope={scope:?} endpoint={subject:?}");
            }
            EventKind::ClientClosed => {
                tracing::debug!("[client-closed] scope={scope:?} endpoint={subject:?}");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!("[subscriber-overflow] subscriber={subject:?} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!("[subscriber-panicked] subscriber={subject} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
