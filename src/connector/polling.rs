//! HTTP long-poll transport.
//!
//! The orchestrator answers `204 No Content` while it is still working on the
//! current step. Such answers are retried a few times with a short delay
//! inside a single [`next`](ConnectorTransport::next) call; if the orchestrator
//! is still not ready afterwards, `next` reports `None` and the session polls
//! again on its own schedule. Every `204` is followed by a `retry_delay` pause,
//! so consecutive fetches are always spaced out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::{
    ConnectorTransport, Credentials, DeliverRequest, DeliverResponse, Envelope, ProtocolUnit,
    Target, TransportError, TransportResult, USER_AGENT, unit::FetchRequest,
};
use crate::config::{ApiConfig, DeliveryConfig};

pub const SERVICE_DELIVER_PATH: &str = "service/deliver";
pub const SERVICE_FETCH_PATH: &str = "service/fetch";
pub const CONNECTOR_PATH: &str = "connector/json";
pub const CONNECTOR_ERROR_PATH: &str = "connector/error";

/// Inner retry policy for "not ready" answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(500),
            max_retries: 5,
        }
    }
}

impl From<&DeliveryConfig> for PollConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            max_retries: config.max_retries,
        }
    }
}

/// Whether a `204` answer means "ask again" or "accepted".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnNoContent {
    Retry,
    Accept,
}

pub struct PollingTransport {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    poll: PollConfig,
    trace: bool,
    session_id: Option<String>,
}

impl PollingTransport {
    pub fn new(base_url: Url, poll: PollConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()?;

        Ok(Self {
            client,
            base_url,
            credentials: None,
            poll,
            trace: false,
            session_id: None,
        })
    }

    pub fn from_config(api: &ApiConfig, poll: PollConfig) -> TransportResult<Self> {
        let mut transport = Self::new(api.base_url(), poll)?;
        transport.credentials = api.auth.as_ref().map(Credentials::parse);
        transport.trace = api.trace;
        Ok(transport)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// POSTs `body` and returns the response text, or `None` if the
    /// orchestrator kept answering `204` through every retry.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        on_no_content: OnNoContent,
    ) -> TransportResult<Option<String>> {
        let url = self.base_url.join(path)?;
        if self.trace {
            debug!("POST {url}: {}", serde_json::to_string(body)?);
        }

        let mut attempt = 0;
        loop {
            let mut request = self
                .client
                .post(url.clone())
                .header(header::ACCEPT, "application/json")
                .json(body);
            if let Some(credentials) = &self.credentials {
                request = credentials.apply(request);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::NO_CONTENT {
                if on_no_content == OnNoContent::Accept {
                    return Ok(Some(String::new()));
                }
                // Pause after every 204, the last one included
                tokio::time::sleep(self.poll.retry_delay).await;
                if attempt >= self.poll.max_retries {
                    return Ok(None);
                }
                attempt += 1;
                debug!("{path} not ready, retry {attempt}/{}", self.poll.max_retries);
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                warn!("{path} failed with {status}");
                return Err(TransportError::Status { status, body: text });
            }
            if self.trace {
                debug!("RECV: {text}");
            }
            return Ok(Some(text));
        }
    }

    fn active_session(&self) -> TransportResult<&str> {
        self.session_id.as_deref().ok_or(TransportError::NotStarted)
    }
}

#[async_trait]
impl ConnectorTransport for PollingTransport {
    async fn start(&mut self, target: &Target) -> TransportResult<String> {
        let body = self
            .post(SERVICE_DELIVER_PATH, &DeliverRequest { target }, OnNoContent::Retry)
            .await?
            .ok_or_else(|| TransportError::Protocol("delivery was never accepted".into()))?;
        let DeliverResponse { session_id } = serde_json::from_str(&body)?;

        debug!("Delivery started with session {session_id}");
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    async fn next(&mut self) -> TransportResult<Option<ProtocolUnit>> {
        let session_id = self.active_session()?;
        let fetch = FetchRequest { session_id };

        let Some(body) = self.post(SERVICE_FETCH_PATH, &fetch, OnNoContent::Retry).await? else {
            return Ok(None);
        };
        let envelope: Envelope = serde_json::from_str(&body)?;
        envelope.open(session_id).map(Some)
    }

    async fn send(&mut self, unit: ProtocolUnit) -> TransportResult<()> {
        let session_id = self.active_session()?;
        let path = match unit {
            ProtocolUnit::Error { .. } => CONNECTOR_ERROR_PATH,
            _ => CONNECTOR_PATH,
        };
        let envelope = Envelope::new(session_id, unit);
        self.post(path, &envelope, OnNoContent::Accept).await?;
        Ok(())
    }
}
