mod common;

use common::MockTransport;
use muxstream::core::codec::SerialCodec;
use muxstream::core::errors::ClientError;
use muxstream::core::serial::SerialClient;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Plain JSON codec with no correlation id anywhere.
struct PlainJsonCodec;

impl SerialCodec for PlainJsonCodec {
    type Request = Value;
    type Reply = Value;

    fn encode_request(&self, request: &Value) -> Result<Message, ClientError> {
        Ok(Message::Text(request.to_string()))
    }

    fn decode_reply(&self, frame: Message) -> Result<Option<Value>, ClientError> {
        let Message::Text(text) = frame else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

fn echo_responder() -> impl Fn(&Message) -> Vec<Message> + Send + Sync + 'static {
    move |msg| {
        let Message::Text(text) = msg else {
            return vec![];
        };
        let v: Value = serde_json::from_str(text).unwrap();
        vec![Message::Text(json!({"echo": v["n"]}).to_string())]
    }
}

#[tokio::test]
async fn nth_reply_answers_nth_request() {
    let (transport, handle) = MockTransport::new();
    handle.set_responder(echo_responder());
    let client = SerialClient::new("ws://mock", transport, PlainJsonCodec);

    let a = client.request(&json!({"n": 1})).await.unwrap();
    let b = client.request(&json!({"n": 2})).await.unwrap();
    assert_eq!(a, json!({"echo": 1}));
    assert_eq!(b, json!({"echo": 2}));
}

#[tokio::test]
async fn concurrent_requests_are_serialized_by_the_lock() {
    let (transport, handle) = MockTransport::new();
    handle.set_responder(echo_responder());
    let client = SerialClient::new("ws://mock", transport, PlainJsonCodec);

    let (r1, r2, r3) = (json!({"n": 1}), json!({"n": 2}), json!({"n": 3}));
    let (a, b, c) = tokio::join!(client.request(&r1), client.request(&r2), client.request(&r3),);
    assert_eq!(a.unwrap(), json!({"echo": 1}));
    assert_eq!(b.unwrap(), json!({"echo": 2}));
    assert_eq!(c.unwrap(), json!({"echo": 3}));
}

#[tokio::test]
async fn listener_death_interrupts_the_waiting_request() {
    let (transport, handle) = MockTransport::new();
    let client = SerialClient::new("ws://mock", transport, PlainJsonCodec);

    let driver = async {
        handle.wait_for_sends(1).await;
        handle.inject_error(ClientError::connectivity("link down"));
    };
    let req = json!({"n": 1});
    let (res, _) = tokio::join!(client.request(&req), driver);
    assert_eq!(res.unwrap_err(), ClientError::connectivity("link down"));
}
