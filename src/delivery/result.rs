use std::fmt;

use super::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl DeliveryStatus {
    pub(crate) fn from_state(state: SessionState) -> Option<Self> {
        match state {
            SessionState::Succeeded => Some(DeliveryStatus::Succeeded),
            SessionState::Failed => Some(DeliveryStatus::Failed),
            SessionState::Cancelled => Some(DeliveryStatus::Cancelled),
            SessionState::TimedOut => Some(DeliveryStatus::TimedOut),
            _ => None,
        }
    }
}

/// The outcome of a delivery session, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    status: DeliveryStatus,
    message: String,
}

impl DeliveryResult {
    pub fn new(status: DeliveryStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Succeeded
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            DeliveryStatus::Succeeded => write!(f, "Delivered: {}", self.message),
            DeliveryStatus::Failed => write!(f, "Failed: {}", self.message),
            DeliveryStatus::Cancelled => write!(f, "Cancelled: {}", self.message),
            DeliveryStatus::TimedOut => write!(f, "Timed out: {}", self.message),
        }
    }
}
