use reqwest::StatusCode;
use tokio_tungstenite::tungstenite;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Orchestrator answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    #[error("Malformed protocol unit: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Transport used before the delivery was started")]
    NotStarted,

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(err))
    }
}
