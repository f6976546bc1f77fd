use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{DeliveryResult, DeliveryStatus, SessionState};

/// Flags a session for cancellation.
///
/// Cheap to clone and usable before the session is started. The first reason
/// given wins; later calls are ignored.
#[derive(Debug, Clone)]
pub struct Canceller {
    reason: Arc<watch::Sender<Option<String>>>,
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

impl Canceller {
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self {
            reason: Arc::new(reason),
        }
    }

    /// Requests cancellation. Never blocks and never interrupts card I/O.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::debug!("Cancellation requested: {reason}");
            *current = Some(reason);
            true
        });
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.borrow().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason.borrow().is_some()
    }

    /// Resolves with the reason once cancellation has been requested.
    pub async fn cancelled(&self) -> String {
        let mut rx = self.reason.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone(),
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            // The sender lives as long as `self`, so this is unreachable in practice
            None => std::future::pending().await,
        }
    }
}

/// The session task was still running when the wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Delivery session is still running")]
pub struct StillRunning;

/// Caller side of a started delivery session.
#[derive(Debug)]
pub struct DeliveryHandle {
    canceller: Canceller,
    state: watch::Receiver<SessionState>,
    result: watch::Receiver<Option<DeliveryResult>>,
    task: JoinHandle<()>,
}

impl DeliveryHandle {
    pub(crate) fn new(
        canceller: Canceller,
        state: watch::Receiver<SessionState>,
        result: watch::Receiver<Option<DeliveryResult>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            canceller,
            state,
            result,
            task,
        }
    }

    /// Flags the session for cancellation and returns immediately.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.canceller.cancel(reason);
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.result.borrow().is_some() || self.task.is_finished()
    }

    /// Waits up to `timeout` for the session to finish.
    pub async fn await_result(&self, timeout: Duration) -> Result<DeliveryResult, StillRunning> {
        tokio::time::timeout(timeout, self.result())
            .await
            .map_err(|_| StillRunning)
    }

    /// Waits for the session to finish, however long it takes.
    pub async fn result(&self) -> DeliveryResult {
        let mut result = self.result.clone();
        let outcome = match result.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        // A closed channel without a result means the session task died
        outcome.unwrap_or_else(|| {
            tracing::error!("Delivery session ended without a result");
            DeliveryResult::new(
                DeliveryStatus::Failed,
                "Delivery session terminated unexpectedly",
            )
        })
    }
}
