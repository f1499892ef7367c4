#![allow(dead_code)]

use async_trait::async_trait;
use muxstream::core::errors::ClientError;
use muxstream::core::transport::{Transport, TransportSink, TransportStream};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

type Responder = dyn Fn(&Message) -> Vec<Message> + Send + Sync;

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
    sent: Mutex<Vec<Message>>,
    inbound: Mutex<Option<mpsc::UnboundedSender<Result<Message, ClientError>>>>,
    responder: Mutex<Option<Arc<Responder>>>,
}

/// Scripted in-process transport: the test side injects inbound frames and
/// inspects what the client sent, optionally auto-replying per sent frame.
pub struct MockTransport {
    state: Arc<MockState>,
    connect_delay: Duration,
}

#[derive(Clone)]
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(MockState::default());
        (
            Self {
                state: Arc::clone(&state),
                connect_delay: Duration::from_millis(20),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Auto-reply: for every frame the client sends, queue the returned frames
    /// as inbound.
    pub fn set_responder(&self, f: impl Fn(&Message) -> Vec<Message> + Send + Sync + 'static) {
        *self.state.responder.lock().unwrap() = Some(Arc::new(f));
    }

    /// Inject one inbound frame, as if the server pushed it.
    pub fn push(&self, msg: Message) {
        if let Some(tx) = self.state.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(msg));
        }
    }

    pub fn push_json(&self, v: &Value) {
        self.push(Message::Text(v.to_string()));
    }

    /// Make the listener's next receive fail with `err`.
    pub fn inject_error(&self, err: ClientError) {
        if let Some(tx) = self.state.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(Err(err));
        }
    }

    /// Sever the connection: the read half sees end-of-stream.
    pub fn drop_connection(&self) {
        self.state.inbound.lock().unwrap().take();
    }

    pub fn fail_connects(&self, on: bool) {
        self.state.fail_connect.store(on, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, on: bool) {
        self.state.fail_send.store(on, Ordering::SeqCst);
    }

    /// Number of physical connect attempts so far.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Message> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                Message::Text(t) => serde_json::from_str(&t).ok(),
                _ => None,
            })
            .collect()
    }

    /// Wait until the client has sent at least `n` frames.
    pub async fn wait_for_sends(&self, n: usize) {
        while self.sent().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

pub struct MockSink {
    state: Arc<MockState>,
}

pub struct MockStream {
    rx: mpsc::UnboundedReceiver<Result<Message, ClientError>>,
}

#[async_trait]
impl Transport for MockTransport {
    type Sink = MockSink;
    type Stream = MockStream;

    async fn connect(
        &self,
        _url: &str,
        _timeout: Duration,
    ) -> Result<(Self::Sink, Self::Stream), ClientError> {
        tokio::time::sleep(self.connect_delay).await;
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ClientError::connectivity("mock connect refused"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.inbound.lock().unwrap() = Some(tx);
        Ok((
            MockSink {
                state: Arc::clone(&self.state),
            },
            MockStream { rx },
        ))
    }
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, msg: Message) -> Result<(), ClientError> {
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(ClientError::connectivity("mock send refused"));
        }
        let responder = self.state.responder.lock().unwrap().clone();
        let replies = responder.map(|r| r(&msg)).unwrap_or_default();
        self.state.sent.lock().unwrap().push(msg);
        if let Some(tx) = self.state.inbound.lock().unwrap().as_ref() {
            for reply in replies {
                let _ = tx.send(Ok(reply));
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

#[async_trait]
impl TransportStream for MockStream {
    async fn next(&mut self) -> Option<Result<Message, ClientError>> {
        self.rx.recv().await
    }
}

/// Responder that speaks just enough of the indexer control protocol:
/// acknowledge subscribes, stay silent on unsubscribes.
pub fn indexer_responder() -> impl Fn(&Message) -> Vec<Message> + Send + Sync + 'static {
    move |msg| {
        let Message::Text(text) = msg else {
            return vec![];
        };
        let Ok(v) = serde_json::from_str::<Value>(text) else {
            return vec![];
        };
        if v["type"] == "subscribe" {
            let mut ack = json!({
                "type": "subscribed",
                "connection_id": "mock",
                "message_id": 1,
                "channel": v["channel"],
                "contents": {},
            });
            if !v["id"].is_null() {
                ack["id"] = v["id"].clone();
            }
            vec![Message::Text(ack.to_string())]
        } else {
            vec![]
        }
    }
}

/// A `channel_data` frame for `channel` carrying `contents`.
pub fn channel_data(channel: &str, contents: Value) -> Value {
    json!({
        "type": "channel_data",
        "connection_id": "mock",
        "message_id": 2,
        "channel": channel,
        "version": "2.4.0",
        "contents": contents,
    })
}

/// A `channel_batch_data` frame for `channel` carrying `records`.
pub fn channel_batch_data(channel: &str, records: Value) -> Value {
    json!({
        "type": "channel_batch_data",
        "connection_id": "mock",
        "message_id": 2,
        "channel": channel,
        "version": "2.4.0",
        "contents": records,
    })
}
