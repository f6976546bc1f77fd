use std::time::Duration;

use crate::card::CardError;
use crate::connector::TransportError;

use super::SessionState;

/// Why a delivery session stopped short of success.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Card communication error: {0}")]
    Card(#[from] CardError),

    #[error("Field {field} could not be supplied: {reason}")]
    FieldUnavailable { field: String, reason: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Orchestrator(String),
}

impl DeliveryError {
    /// Terminal state this error leads to.
    pub fn terminal_state(&self) -> SessionState {
        match self {
            DeliveryError::Cancelled(_) => SessionState::Cancelled,
            DeliveryError::TimedOut(_) => SessionState::TimedOut,
            _ => SessionState::Failed,
        }
    }

    /// Message for the best-effort error notice, if the orchestrator should
    /// be told about this failure at all.
    ///
    /// Orchestrator errors came from the orchestrator, and a broken transport
    /// cannot carry the notice anyway.
    pub fn notice(&self) -> Option<String> {
        match self {
            DeliveryError::Transport(_) | DeliveryError::Orchestrator(_) => None,
            DeliveryError::Cancelled(reason) => Some(reason.clone()),
            e => Some(e.to_string()),
        }
    }
}
