use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{Instrument as _, debug, error, info, warn};

use super::{Canceller, DeliveryError, DeliveryHandle, DeliveryResult, DeliveryStatus, SessionState};
use crate::card::CardChannel;
use crate::connector::{ConnectorTransport, ProtocolUnit, Target, TransportError};
use crate::form::{FormError, FormHandler};

/// Upper bound for delivering a best-effort error notice or closing the transport.
const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

/// One provisioning attempt against one card.
///
/// The session exclusively owns its card channel, transport and form handler.
/// Exchanges are strictly request/response: a new unit is only fetched once
/// the previous one has been fully handled and answered.
pub struct DeliverySession {
    card: Box<dyn CardChannel>,
    transport: Box<dyn ConnectorTransport>,
    form: Box<dyn FormHandler>,
    target: Target,
    timeout: Option<Duration>,
    canceller: Canceller,
    state: watch::Sender<SessionState>,
    session_id: Option<String>,
}

impl DeliverySession {
    pub fn new(
        card: impl CardChannel + 'static,
        transport: impl ConnectorTransport + 'static,
        target: Target,
        form: impl FormHandler + 'static,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Created);
        Self {
            card: Box::new(card),
            transport: Box::new(transport),
            form: Box::new(form),
            target,
            timeout: None,
            canceller: Canceller::new(),
            state,
            session_id: None,
        }
    }

    /// Bounds the whole session. Without a timeout the session polls until
    /// the orchestrator finishes or the session is cancelled.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// A canceller that can be used before or after [`start`](Self::start).
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Runs the session on its own task.
    pub fn start(self) -> DeliveryHandle {
        let canceller = self.canceller.clone();
        let state = self.state.subscribe();
        let (result_tx, result_rx) = watch::channel(None);

        let span = tracing::info_span!(
            "delivery",
            owner = %self.target.owner(),
            session = tracing::field::Empty
        );
        let task = tokio::spawn(
            async move {
                let result = self.run().await;
                let _ = result_tx.send(Some(result));
            }
            .instrument(span),
        );

        DeliveryHandle::new(canceller, state, result_rx, task)
    }

    /// Runs the session to completion on the current task.
    pub async fn run(mut self) -> DeliveryResult {
        let outcome = self.drive().await;
        let result = self.finish(outcome).await;
        if tokio::time::timeout(NOTICE_TIMEOUT, self.transport.close()).await.is_err() {
            warn!("Timed out closing the transport");
        }
        result
    }

    async fn drive(&mut self) -> Result<Option<String>, DeliveryError> {
        if let Some(reason) = self.canceller.reason() {
            return Err(DeliveryError::Cancelled(reason));
        }

        self.transition(SessionState::Started);
        // A timeout too large to represent is the same as none
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        let session_id = tokio::select! {
            biased;
            reason = self.canceller.cancelled() => return Err(DeliveryError::Cancelled(reason)),
            () = sleep_until(deadline) => return Err(self.timed_out()),
            started = self.transport.start(&self.target) => started?,
        };
        tracing::Span::current().record("session", session_id.as_str());
        info!("Delivery session {session_id} started");
        self.session_id = Some(session_id);

        loop {
            // Checked between exchanges so that a round-trip in progress is
            // always completed before the session stops
            if let Some(reason) = self.canceller.reason() {
                return Err(DeliveryError::Cancelled(reason));
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(self.timed_out());
            }
            self.transition(SessionState::AwaitingUnit);

            let unit = tokio::select! {
                biased;
                reason = self.canceller.cancelled() => return Err(DeliveryError::Cancelled(reason)),
                () = sleep_until(deadline) => return Err(self.timed_out()),
                unit = self.transport.next() => unit?,
            };
            let Some(unit) = unit else {
                tokio::task::yield_now().await;
                continue;
            };
            debug!("Received {} unit", unit.kind());

            match unit {
                ProtocolUnit::Command { payload } => {
                    self.transition(SessionState::DispatchingCommand);
                    let response = self.card.transmit(&payload).await?;
                    self.transport
                        .send(ProtocolUnit::Response { payload: response })
                        .await?;
                }
                ProtocolUnit::FieldRequest { field_id, prompt } => {
                    self.transition(SessionState::AwaitingField);
                    let supplied = tokio::select! {
                        biased;
                        reason = self.canceller.cancelled() => return Err(DeliveryError::Cancelled(reason)),
                        () = sleep_until(deadline) => return Err(self.timed_out()),
                        value = self.form.supply(&field_id, prompt.as_deref()) => value,
                    };
                    let value = supplied.map_err(|e| match e {
                        FormError::Cancelled(reason) => DeliveryError::Cancelled(reason),
                        e => DeliveryError::FieldUnavailable {
                            field: field_id.clone(),
                            reason: e.to_string(),
                        },
                    })?;
                    self.transport
                        .send(ProtocolUnit::FieldResponse { field_id, value })
                        .await?;
                }
                ProtocolUnit::Complete { message } => return Ok(message),
                ProtocolUnit::Error { message } => return Err(DeliveryError::Orchestrator(message)),
                unit @ (ProtocolUnit::Response { .. } | ProtocolUnit::FieldResponse { .. }) => {
                    return Err(TransportError::Protocol(format!(
                        "unexpected {} unit from orchestrator",
                        unit.kind()
                    ))
                    .into());
                }
            }
        }
    }

    async fn finish(&mut self, outcome: Result<Option<String>, DeliveryError>) -> DeliveryResult {
        let error = match outcome {
            Ok(message) => {
                self.transition(SessionState::Succeeded);
                let message = message.unwrap_or_else(|| "Delivery completed".to_string());
                info!("Delivery succeeded: {message}");
                return DeliveryResult::new(DeliveryStatus::Succeeded, message);
            }
            Err(error) => error,
        };

        let terminal = error.terminal_state();
        if terminal == SessionState::Cancelled && self.state() != SessionState::Created {
            self.transition(SessionState::Cancelling);
        }
        if let Some(notice) = error.notice() {
            self.notify(notice).await;
        }
        self.transition(terminal);

        let message = match error {
            DeliveryError::Orchestrator(message) | DeliveryError::Cancelled(message) => message,
            error => error.to_string(),
        };
        match terminal {
            SessionState::Cancelled => warn!("Delivery cancelled: {message}"),
            _ => error!("Delivery failed: {message}"),
        }

        let status = DeliveryStatus::from_state(terminal).unwrap_or(DeliveryStatus::Failed);
        DeliveryResult::new(status, message)
    }

    /// Tells the orchestrator the session is being abandoned. Failures are
    /// logged and otherwise ignored.
    async fn notify(&mut self, message: String) {
        if self.session_id.is_none() {
            return;
        }
        let notice = ProtocolUnit::Error { message };
        match tokio::time::timeout(NOTICE_TIMEOUT, self.transport.send(notice)).await {
            Ok(Ok(())) => debug!("Error notice delivered"),
            Ok(Err(e)) => warn!("Failed to notify orchestrator: {e}"),
            Err(_) => warn!("Timed out notifying orchestrator"),
        }
    }

    fn timed_out(&self) -> DeliveryError {
        DeliveryError::TimedOut(self.timeout.unwrap_or_default())
    }

    fn transition(&self, next: SessionState) {
        let current = self.state();
        if current == next {
            return;
        }
        if !current.can_transition_to(&next) {
            error!("Invalid session transition {current} -> {next}");
            debug_assert!(false, "invalid session transition {current} -> {next}");
        }
        debug!("Session {current} -> {next}");
        self.state.send_replace(next);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
