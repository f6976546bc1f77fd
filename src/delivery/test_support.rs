use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::card::{CardChannel, CardError, CardResult};
use crate::connector::{ConnectorTransport, ProtocolUnit, Target, TransportError, TransportResult};
use crate::form::{FormError, FormHandler, FormResult};

pub const SESSION_ID: &str = "3c1f9a2e";

/// Everything the session did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Received(ProtocolUnit),
    Transmitted(Vec<u8>),
    Sent(ProtocolUnit),
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct Log {
    events: Arc<Mutex<Vec<Event>>>,
    polls: Arc<AtomicUsize>,
}

impl Log {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transmitted(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<ProtocolUnit> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sent(unit) => Some(unit),
                _ => None,
            })
            .collect()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

pub type Step = TransportResult<Option<ProtocolUnit>>;

/// Replays a fixed script of fetch results. Once the script runs out it keeps
/// answering "not ready".
pub struct ScriptedTransport {
    log: Log,
    script: VecDeque<Step>,
    refuse: Option<TransportError>,
    stall_on_close: bool,
}

impl ScriptedTransport {
    pub fn new(log: &Log, script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            log: log.clone(),
            script: script.into_iter().collect(),
            refuse: None,
            stall_on_close: false,
        }
    }

    /// Makes `close` never return.
    pub fn stalling_close(mut self) -> Self {
        self.stall_on_close = true;
        self
    }

    pub fn refusing(mut self, error: TransportError) -> Self {
        self.refuse = Some(error);
        self
    }
}

#[async_trait]
impl ConnectorTransport for ScriptedTransport {
    async fn start(&mut self, _target: &Target) -> TransportResult<String> {
        if let Some(error) = self.refuse.take() {
            return Err(error);
        }
        self.log.push(Event::Started);
        Ok(SESSION_ID.to_string())
    }

    async fn next(&mut self) -> TransportResult<Option<ProtocolUnit>> {
        self.log.polls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(Some(unit))) => {
                self.log.push(Event::Received(unit.clone()));
                Ok(Some(unit))
            }
            Some(step) => step,
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(None)
            }
        }
    }

    async fn send(&mut self, unit: ProtocolUnit) -> TransportResult<()> {
        self.log.push(Event::Sent(unit));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.push(Event::Closed);
        if self.stall_on_close {
            std::future::pending::<()>().await;
        }
    }
}

/// Answers every command with `9000`, or fails once if told to.
pub struct RecordingCard {
    log: Log,
    failure: Option<CardError>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl RecordingCard {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            failure: None,
            gate: None,
        }
    }

    pub fn failing(mut self, error: CardError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Makes `transmit` signal `entered` and then hold until `release` fires.
    pub fn gated(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }
}

#[async_trait]
impl CardChannel for RecordingCard {
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>> {
        self.log.push(Event::Transmitted(command.to_vec()));
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(error) = self.failure.take() {
            return Err(error);
        }
        Ok(vec![0x90, 0x00])
    }
}

/// A form whose user never answers.
pub struct SilentForm;

#[async_trait]
impl FormHandler for SilentForm {
    async fn supply(&self, _field_id: &str, _prompt: Option<&str>) -> FormResult<String> {
        std::future::pending().await
    }
}

/// A form whose user aborts every input.
pub struct AbortingForm;

#[async_trait]
impl FormHandler for AbortingForm {
    async fn supply(&self, _field_id: &str, _prompt: Option<&str>) -> FormResult<String> {
        Err(FormError::Cancelled("user aborted input".into()))
    }
}

pub fn target() -> Target {
    Target::service("a1b2c3d4", "install")
}

pub fn command(payload: &[u8]) -> Step {
    Ok(Some(ProtocolUnit::Command {
        payload: payload.to_vec(),
    }))
}

pub fn not_ready() -> Step {
    Ok(None)
}

pub fn complete(message: Option<&str>) -> Step {
    Ok(Some(ProtocolUnit::Complete {
        message: message.map(str::to_string),
    }))
}

pub fn response(payload: &[u8]) -> ProtocolUnit {
    ProtocolUnit::Response {
        payload: payload.to_vec(),
    }
}
