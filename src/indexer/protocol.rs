use crate::core::codec::{Classified, StreamCodec, SubscribeOptions};
use crate::core::errors::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::info;

/// Handshake frame, sent once per connection. Consumed by the codec, never
/// surfaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connected {
    pub connection_id: String,
    pub message_id: u64,
}

/// Subscription acknowledgement; `contents` carries the channel's initial
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscribed {
    pub connection_id: String,
    pub message_id: u64,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub contents: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unsubscribed {
    pub connection_id: String,
    pub message_id: u64,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorMsg {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<u64>,
    pub message: String,
}

/// Payload of a `channel_data` / `channel_batch_data` frame. For batch frames
/// `contents` is an array of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub connection_id: String,
    pub message_id: u64,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub contents: Value,
}

/// Every inbound indexer frame decodes to exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexerMessage {
    Connected(Connected),
    Subscribed(Subscribed),
    Unsubscribed(Unsubscribed),
    Error(ErrorMsg),
    ChannelData(Data),
    ChannelBatchData(Data),
}

/// Replies routed to request/response waiters (everything except the
/// handshake and channel data).
#[derive(Debug, Clone, PartialEq)]
pub enum IndexerReply {
    Subscribed(Subscribed),
    Unsubscribed(Unsubscribed),
    Error(ErrorMsg),
}

/// One channel event as handed to the subscription registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub channel: String,
    pub id: Option<String>,
    pub version: Option<String>,
    pub contents: Value,
    /// Whether `contents` is a pre-batched array of records.
    pub batched: bool,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batched: Option<bool>,
}

/// Codec for the indexer streaming protocol.
#[derive(Debug, Default, Clone)]
pub struct IndexerCodec;

impl IndexerCodec {
    fn frame_text(frame: &Message) -> Result<Option<&str>, ClientError> {
        match frame {
            Message::Text(text) => Ok(Some(text.as_str())),
            Message::Binary(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ClientError::protocol(format!("invalid UTF-8 frame: {e}"))),
            _ => Ok(None),
        }
    }
}

impl StreamCodec for IndexerCodec {
    type Reply = IndexerReply;
    type Event = ChannelEvent;

    fn subscribe_frame(
        &self,
        channel: &str,
        options: &SubscribeOptions,
    ) -> Result<Message, ClientError> {
        let request = SubscribeRequest {
            kind: "subscribe",
            channel,
            id: options.id.as_deref(),
            batched: options.batched,
        };
        Ok(Message::Text(serde_json::to_string(&request)?))
    }

    fn unsubscribe_frame(&self, channel: &str) -> Result<Message, ClientError> {
        let request = SubscribeRequest {
            kind: "unsubscribe",
            channel,
            id: None,
            batched: None,
        };
        Ok(Message::Text(serde_json::to_string(&request)?))
    }

    fn classify(
        &self,
        frame: Message,
    ) -> Result<Option<Classified<IndexerReply, ChannelEvent>>, ClientError> {
        let Some(text) = Self::frame_text(&frame)? else {
            return Ok(None);
        };
        let msg: IndexerMessage = serde_json::from_str(text)?;
        let classified = match msg {
            IndexerMessage::Connected(c) => {
                info!(connection_id = %c.connection_id, "indexer connection established");
                return Ok(None);
            }
            IndexerMessage::ChannelData(d) => Classified::Event {
                channel: d.channel.clone(),
                data: ChannelEvent {
                    channel: d.channel,
                    id: d.id,
                    version: d.version,
                    contents: d.contents,
                    batched: false,
                },
            },
            IndexerMessage::ChannelBatchData(d) => Classified::Event {
                channel: d.channel.clone(),
                data: ChannelEvent {
                    channel: d.channel,
                    id: d.id,
                    version: d.version,
                    contents: d.contents,
                    batched: true,
                },
            },
            IndexerMessage::Subscribed(s) => Classified::Response(IndexerReply::Subscribed(s)),
            IndexerMessage::Unsubscribed(u) => Classified::Response(IndexerReply::Unsubscribed(u)),
            IndexerMessage::Error(e) => Classified::Response(IndexerReply::Error(e)),
        };
        Ok(Some(classified))
    }

    fn accept_subscription(&self, reply: IndexerReply) -> Result<IndexerReply, ClientError> {
        match reply {
            IndexerReply::Subscribed(_) => Ok(reply),
            IndexerReply::Error(e) => Err(ClientError::protocol(format!(
                "subscription rejected: {}",
                e.message
            ))),
            IndexerReply::Unsubscribed(u) => Err(ClientError::protocol(format!(
                "unexpected response type for subscribe: unsubscribed ({})",
                u.channel
            ))),
        }
    }
}
