//! Service delivery sessions.
//!
//! A [`DeliverySession`] owns a card channel and a form handler for its whole
//! lifetime and drives a [`ConnectorTransport`](crate::connector::ConnectorTransport)
//! until the orchestrator reports a terminal outcome, the caller cancels, or
//! the configured timeout elapses.
//!
//! ```no_run
//! # use card_delivery::{card::CardChannel, connector::{ConnectorTransport, Target}, form::ScriptedForm};
//! # async fn run(card: impl CardChannel + 'static, transport: impl ConnectorTransport + 'static) {
//! use card_delivery::delivery::DeliverySession;
//! use std::time::Duration;
//!
//! let handle = DeliverySession::new(card, transport, Target::service("a1b2c3d4", "install"), ScriptedForm::default())
//!     .with_timeout(Duration::from_secs(120))
//!     .start();
//! let result = handle.result().await;
//! println!("{}", result.message());
//! # }
//! ```

mod errors;
mod handle;
pub mod interrupt;
mod result;
mod session;
mod state;

#[cfg(test)]
mod test_support;

pub use errors::DeliveryError;
pub use handle::{Canceller, DeliveryHandle, StillRunning};
pub use result::{DeliveryResult, DeliveryStatus};
pub use session::DeliverySession;
pub use state::SessionState;
