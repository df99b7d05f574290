use std::{fmt, sync::Arc};

use tokio::sync::watch;
use tracing::info;

/// Lifecycle of the ingestion subscriber task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberPhase {
    /// The task is not running (never started, aborted or panicked).
    Stopped,
    Disconnected,
    Connecting,
    Subscribed,
}

impl fmt::Display for SubscriberPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriberPhase::Stopped => "stopped",
            SubscriberPhase::Disconnected => "disconnected",
            SubscriberPhase::Connecting => "connecting",
            SubscriberPhase::Subscribed => "subscribed",
        };
        f.write_str(s)
    }
}

/// Shared view of the subscriber's phase.
///
/// Wrapped in `Arc` so the subscriber task and request handlers hold the same
/// cell. Reads never block the writer.
#[derive(Debug, Clone)]
pub struct SubscriberStatus {
    inner: Arc<watch::Sender<SubscriberPhase>>,
}

impl Default for SubscriberStatus {
    fn default() -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(SubscriberPhase::Stopped)),
        }
    }
}

impl SubscriberStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SubscriberPhase {
        *self.inner.borrow()
    }

    /// `true` from the moment the task starts until it ends for any reason.
    pub fn is_running(&self) -> bool {
        self.phase() != SubscriberPhase::Stopped
    }

    pub fn set(&self, phase: SubscriberPhase) {
        let previous = self.inner.send_replace(phase);
        if previous != phase {
            info!(from = %previous, to = %phase, "Subscriber phase changed");
        }
    }

    /// Marks the task as started. The returned guard flips the phase back to
    /// `Stopped` when dropped, which also happens when the task is aborted or
    /// unwinds from a panic.
    pub fn enter(&self) -> RunningGuard {
        self.set(SubscriberPhase::Disconnected);
        RunningGuard {
            status: self.clone(),
        }
    }
}

#[must_use = "the subscriber reports stopped as soon as the guard is dropped"]
pub struct RunningGuard {
    status: SubscriberStatus,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.status.set(SubscriberPhase::Stopped);
    }
}
