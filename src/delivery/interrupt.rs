//! Turning an external interrupt (usually Ctrl-C) into a cancellation.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::{DeliveryHandle, DeliveryResult, DeliveryStatus};

/// How long a cancelled session gets to wind down before the caller gives up on it.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub const INTERRUPT_REASON: &str = "Ctrl-C pressed";

/// Waits for the session to finish, cancelling it if `interrupt` resolves first.
///
/// After an interrupt the session gets `grace` to reach a terminal state. A
/// card exchange in progress is never cut short, so a session stuck on the
/// card is reported as cancelled without waiting for it.
pub async fn deliver_until_interrupted<F>(
    handle: &DeliveryHandle,
    interrupt: F,
    grace: Duration,
) -> DeliveryResult
where
    F: Future<Output = ()>,
{
    tokio::select! {
        result = handle.result() => return result,
        () = interrupt => {}
    }

    warn!("Interrupted, cancelling delivery");
    handle.cancel(INTERRUPT_REASON);

    match handle.await_result(grace).await {
        Ok(result) => result,
        Err(e) => {
            warn!("{e} {grace:?} after cancellation, giving up");
            DeliveryResult::new(
                DeliveryStatus::Cancelled,
                format!("{INTERRUPT_REASON}, session did not stop within {grace:?}"),
            )
        }
    }
}
