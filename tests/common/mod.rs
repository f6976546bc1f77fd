#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use card_delivery::card::{CardChannel, CardResult};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// What the mock orchestrator answers to the next fetch.
pub enum Reply {
    NotReady,
    Unit(Value),
    Status(StatusCode),
}

#[derive(Default)]
pub struct Recorded {
    pub deliveries: Vec<Value>,
    pub fetches: usize,
    pub sent: Vec<Value>,
    pub notices: Vec<Value>,
    pub authorization: Vec<String>,
    pub user_agents: Vec<String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    pub session_id: String,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    refuse_with: Option<StatusCode>,
    recorded: Arc<Mutex<Recorded>>,
}

impl Orchestrator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            refuse_with: None,
            recorded: Arc::default(),
        }
    }

    pub fn refusing(mut self, status: StatusCode) -> Self {
        self.refuse_with = Some(status);
        self
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    fn record_headers(&self, headers: &HeaderMap) {
        let mut recorded = self.recorded();
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            recorded
                .authorization
                .push(value.to_str().unwrap().to_string());
        }
        if let Some(value) = headers.get(header::USER_AGENT) {
            recorded.user_agents.push(value.to_str().unwrap().to_string());
        }
    }
}

async fn deliver(
    State(orchestrator): State<Orchestrator>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    orchestrator.record_headers(&headers);
    orchestrator.recorded().deliveries.push(body);
    if let Some(status) = orchestrator.refuse_with {
        return (status, "delivery refused").into_response();
    }
    Json(json!({ "sessionId": orchestrator.session_id })).into_response()
}

async fn fetch(
    State(orchestrator): State<Orchestrator>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    orchestrator.record_headers(&headers);
    assert_eq!(body["sessionId"], orchestrator.session_id.as_str());
    orchestrator.recorded().fetches += 1;

    let reply = orchestrator.replies.lock().unwrap().pop_front();
    match reply {
        None | Some(Reply::NotReady) => StatusCode::NO_CONTENT.into_response(),
        Some(Reply::Unit(unit)) => {
            let mut envelope = unit;
            envelope["sessionId"] = json!(orchestrator.session_id);
            Json(envelope).into_response()
        }
        Some(Reply::Status(status)) => (status, "orchestrator exploded").into_response(),
    }
}

async fn connector_json(
    State(orchestrator): State<Orchestrator>,
    Json(body): Json<Value>,
) -> StatusCode {
    orchestrator.recorded().sent.push(body);
    StatusCode::OK
}

async fn connector_error(
    State(orchestrator): State<Orchestrator>,
    Json(body): Json<Value>,
) -> StatusCode {
    orchestrator.recorded().notices.push(body);
    StatusCode::NO_CONTENT
}

/// Serves the polling endpoints on a random local port and returns the API base URL.
pub async fn spawn_orchestrator(orchestrator: Orchestrator) -> String {
    let app = Router::new()
        .route("/v2/service/deliver", post(deliver))
        .route("/v2/service/fetch", post(fetch))
        .route("/v2/connector/json", post(connector_json))
        .route("/v2/connector/error", post(connector_error))
        .with_state(orchestrator);

    // Use a random OS port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("failed to run mock orchestrator");
    });

    format!("http://127.0.0.1:{port}/v2/")
}

/// One step of a scripted WebSocket peer.
pub enum Frame {
    /// Wait for one frame from the client and record it.
    Receive,
    Send(Value),
    Close,
}

pub struct Peer {
    pub url: String,
    pub received: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl Peer {
    /// Waits for the peer to see the connection end and returns every frame it received.
    pub async fn finish(self) -> Vec<Value> {
        self.task.await.unwrap();
        self.received.lock().unwrap().clone()
    }
}

/// Accepts a single WebSocket connection and plays `script` on it. Once the
/// script is exhausted, frames are recorded until the client goes away.
pub async fn spawn_peer(script: Vec<Frame>) -> Peer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));

    let log = received.clone();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        for step in script {
            match step {
                Frame::Receive => match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        log.lock().unwrap().push(serde_json::from_str(&text).unwrap());
                    }
                    other => panic!("expected a text frame, got {other:?}"),
                },
                Frame::Send(value) => {
                    socket.send(Message::text(value.to_string())).await.unwrap();
                }
                Frame::Close => {
                    let _ = socket.close(None).await;
                    return;
                }
            }
        }

        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                log.lock().unwrap().push(serde_json::from_str(&text).unwrap());
            }
        }
    });

    Peer {
        url: format!("ws://127.0.0.1:{port}/run"),
        received,
        task,
    }
}

/// Answers every command with `9000` and remembers what it was sent.
#[derive(Clone, Default)]
pub struct TestCard {
    pub commands: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TestCard {
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(hex::encode_upper)
            .collect()
    }
}

#[async_trait]
impl CardChannel for TestCard {
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>> {
        self.commands.lock().unwrap().push(command.to_vec());
        Ok(vec![0x90, 0x00])
    }
}
