//! WebSocket transport.
//!
//! The delivery request is the first frame sent after the connection is
//! established; the orchestrator answers with the session identifier and from
//! then on pushes one unit per frame.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header},
    },
};
use tracing::{debug, warn};
use url::Url;

use super::{
    ConnectorTransport, Credentials, DeliverRequest, DeliverResponse, Envelope, ProtocolUnit,
    Target, TransportError, TransportResult, USER_AGENT,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// First frame the orchestrator sends back: either the session, or a refusal.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Handshake {
    Refused(ProtocolUnit),
    Accepted(DeliverResponse),
}

pub struct StreamingTransport {
    url: Url,
    credentials: Option<Credentials>,
    socket: Option<Socket>,
    session_id: Option<String>,
}

impl StreamingTransport {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: None,
            socket: None,
            session_id: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    async fn connect(&self) -> TransportResult<Socket> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        if let Some(credentials) = &self.credentials {
            let value = HeaderValue::from_str(&credentials.header_value())
                .map_err(|e| TransportError::Protocol(format!("invalid credentials: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        debug!("Connecting to {}", self.url);
        let (socket, _response) = connect_async(request).await?;
        Ok(socket)
    }

    /// Reads frames until one carries text, skipping control frames.
    async fn read_text(socket: &mut Socket) -> TransportResult<String> {
        loop {
            let message = socket.next().await.ok_or(TransportError::ConnectionClosed)??;
            match message {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Binary(bytes) => {
                    return String::from_utf8(bytes.to_vec())
                        .map_err(|e| TransportError::Protocol(format!("non UTF-8 frame: {e}")));
                }
                Message::Close(frame) => {
                    debug!("Peer closed the connection: {frame:?}");
                    return Err(TransportError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn socket(&mut self) -> TransportResult<(&mut Socket, &str)> {
        match (self.socket.as_mut(), self.session_id.as_deref()) {
            (Some(socket), Some(session_id)) => Ok((socket, session_id)),
            _ => Err(TransportError::NotStarted),
        }
    }
}

#[async_trait]
impl ConnectorTransport for StreamingTransport {
    async fn start(&mut self, target: &Target) -> TransportResult<String> {
        let mut socket = self.connect().await?;

        let hello = serde_json::to_string(&DeliverRequest { target })?;
        socket.send(Message::text(hello)).await?;

        let session_id = match serde_json::from_str(&Self::read_text(&mut socket).await?)? {
            Handshake::Accepted(DeliverResponse { session_id }) => session_id,
            Handshake::Refused(ProtocolUnit::Error { message }) => {
                return Err(TransportError::Protocol(format!("delivery refused: {message}")));
            }
            Handshake::Refused(unit) => {
                return Err(TransportError::Protocol(format!(
                    "expected a session identifier, got {}",
                    unit.kind()
                )));
            }
        };

        debug!("Delivery started with session {session_id}");
        self.socket = Some(socket);
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    async fn next(&mut self) -> TransportResult<Option<ProtocolUnit>> {
        let (socket, session_id) = self.socket()?;
        let text = Self::read_text(socket).await?;
        let envelope: Envelope = serde_json::from_str(&text)?;
        envelope.open(session_id).map(Some)
    }

    async fn send(&mut self, unit: ProtocolUnit) -> TransportResult<()> {
        let (socket, session_id) = self.socket()?;
        let frame = serde_json::to_string(&Envelope::new(session_id, unit))?;
        socket.send(Message::text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                warn!("Failed to close connection cleanly: {e}");
            }
        }
    }
}
