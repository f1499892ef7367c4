use crate::core::errors::ClientError;
use tokio_tungstenite::tungstenite::Message;

/// Classification of an inbound frame by a streaming codec: either the reply
/// to an outstanding request or an event on a subscribed channel. Everything
/// else (handshakes, keep-alives) is consumed by the codec and never reaches
/// the generic core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<R, S> {
    Response(R),
    Event { channel: String, data: S },
}

/// Codec for the ID-multiplexed request/response client.
///
/// The wire protocol must carry the correlation id in both directions;
/// `decode_reply` returning `Ok(None)` means "ignore this frame" (e.g. a
/// keep-alive).
pub trait RpcCodec: Send + Sync + 'static {
    type Request: Send + Sync;
    type Reply: Send + 'static;

    fn encode_request(&self, id: u64, request: &Self::Request) -> Result<Message, ClientError>;

    fn decode_reply(&self, frame: Message) -> Result<Option<(u64, Self::Reply)>, ClientError>;
}

/// Codec for the lock-serialized request/response client, for protocols that
/// carry no correlation id at all.
pub trait SerialCodec: Send + Sync + 'static {
    type Request: Send + Sync;
    type Reply: Send + 'static;

    fn encode_request(&self, request: &Self::Request) -> Result<Message, ClientError>;

    fn decode_reply(&self, frame: Message) -> Result<Option<Self::Reply>, ClientError>;
}

/// Subscription options passed through to the concrete protocol's subscribe
/// control frame.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Correlation string for this subscription (e.g. a market ticker or an
    /// `address/subaccount` pair).
    pub id: Option<String>,
    /// Whether the server should deliver events pre-batched.
    pub batched: Option<bool>,
}

impl SubscribeOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = Some(batched);
        self
    }
}

/// Codec for the streaming pub/sub client.
///
/// Mirrors the protocol boundary: control-frame encoding for
/// subscribe/unsubscribe, classification of inbound frames, and validation of
/// the acknowledgement a subscribe call gets back.
pub trait StreamCodec: Send + Sync + 'static {
    type Reply: Send + 'static;
    type Event: Send + 'static;

    fn subscribe_frame(
        &self,
        channel: &str,
        options: &SubscribeOptions,
    ) -> Result<Message, ClientError>;

    fn unsubscribe_frame(&self, channel: &str) -> Result<Message, ClientError>;

    /// Classify one inbound frame. `Ok(None)` means the frame is handled
    /// entirely inside the codec (connection handshake, keep-alive).
    fn classify(
        &self,
        frame: Message,
    ) -> Result<Option<Classified<Self::Reply, Self::Event>>, ClientError>;

    /// Validate the reply a subscribe call received. The default accepts
    /// anything; protocols with an explicit acknowledgement tag reject error
    /// replies and unexpected tags here.
    fn accept_subscription(&self, reply: Self::Reply) -> Result<Self::Reply, ClientError> {
        Ok(reply)
    }
}
