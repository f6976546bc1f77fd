//! Exchange of protocol units with the remote orchestrator.
//!
//! Both transports implement [`ConnectorTransport`] and can be swapped at
//! session construction time without the session noticing.

pub mod auth;
mod error;
pub mod polling;
pub mod streaming;
mod target;
mod unit;

pub use auth::Credentials;
pub use error::{TransportError, TransportResult};
pub use polling::{PollConfig, PollingTransport};
pub use streaming::StreamingTransport;
pub use target::{CLIENT_SERVICE_PROVIDER, Target, TargetError};
pub use unit::{DeliverRequest, DeliverResponse, Envelope, ProtocolUnit};

use async_trait::async_trait;

pub(crate) const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait ConnectorTransport: Send {
    /// Opens a delivery for `target` and returns the session identifier
    /// correlating every following unit.
    async fn start(&mut self, target: &Target) -> TransportResult<String>;

    /// Waits for the next unit from the orchestrator.
    ///
    /// `Ok(None)` means nothing is ready yet and the caller should ask again.
    async fn next(&mut self) -> TransportResult<Option<ProtocolUnit>>;

    /// Sends a unit to the orchestrator.
    async fn send(&mut self, unit: ProtocolUnit) -> TransportResult<()>;

    /// Releases the underlying connection. Errors are not reported.
    async fn close(&mut self) {}
}

#[async_trait]
impl<T: ConnectorTransport + ?Sized> ConnectorTransport for Box<T> {
    async fn start(&mut self, target: &Target) -> TransportResult<String> {
        (**self).start(target).await
    }

    async fn next(&mut self) -> TransportResult<Option<ProtocolUnit>> {
        (**self).next().await
    }

    async fn send(&mut self, unit: ProtocolUnit) -> TransportResult<()> {
        (**self).send(unit).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
