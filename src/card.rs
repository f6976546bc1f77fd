//! Exclusive access to the physical card.
//!
//! A [`CardChannel`] is owned by exactly one delivery session at a time.
//! `transmit` takes `&mut self`, so the borrow checker already rules out
//! two commands being in flight on the same channel.

#[cfg(feature = "pcsc")]
mod reader;

#[cfg(feature = "pcsc")]
pub use reader::PcscChannel;

use async_trait::async_trait;

pub type CardResult<T> = Result<T, CardError>;

/// Errors raised by a card reader binding.
///
/// Any of these leaves the card in an unknown state, so callers must never
/// retry the command that produced them.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("Card reader unreachable: {0}")]
    Unreachable(String),

    #[error("Card removed from reader")]
    Removed,

    #[error("APDU transmission failed: {0}")]
    TransmissionFailed(String),
}

/// One command APDU in, one response APDU out.
#[async_trait]
pub trait CardChannel: Send {
    /// Sends `command` to the card and returns its raw response, status word included.
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>>;
}

#[async_trait]
impl<C: CardChannel + ?Sized> CardChannel for Box<C> {
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>> {
        (**self).transmit(command).await
    }
}

/// Logs every exchanged APDU at debug level.
#[derive(Debug)]
pub struct TracedChannel<C> {
    inner: C,
}

impl<C: CardChannel> TracedChannel<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: CardChannel> CardChannel for TracedChannel<C> {
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>> {
        tracing::debug!(">> {}", hex::encode_upper(command));
        match self.inner.transmit(command).await {
            Ok(response) => {
                tracing::debug!("<< {}", hex::encode_upper(&response));
                Ok(response)
            }
            Err(e) => {
                tracing::debug!("<< {e}");
                Err(e)
            }
        }
    }
}
