use crate::core::codec::SerialCodec;
use crate::core::errors::ClientError;
use crate::core::session::{Dispatch, SocketClient};
use crate::core::transport::{Transport, WsConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// Dispatcher side of the serialized client: every decoded reply goes into the
/// one shared FIFO queue.
pub struct SerialDispatcher<C: SerialCodec> {
    codec: C,
    replies: mpsc::UnboundedSender<C::Reply>,
}

impl<C: SerialCodec> Dispatch for SerialDispatcher<C> {
    fn dispatch(&self, frame: Message) -> Result<(), ClientError> {
        if let Some(reply) = self.codec.decode_reply(frame)? {
            let _ = self.replies.send(reply);
        }
        Ok(())
    }
}

/// Lock-serialized request/response client, for protocols without correlation
/// ids.
///
/// A mutex admits one outstanding request at a time: send, then take exactly
/// one item off the shared reply queue. Correctness rests on the protocol
/// delivering the nth reply for the nth request; if the server violates that
/// ordering, replies are silently misattributed. The trade-off against the
/// multiplexed client is lower protocol complexity for serialized throughput.
pub struct SerialClient<T: Transport, C: SerialCodec> {
    conn: SocketClient<T, SerialDispatcher<C>>,
    reply_queue: Mutex<mpsc::UnboundedReceiver<C::Reply>>,
}

impl<T: Transport, C: SerialCodec> SerialClient<T, C> {
    pub fn new(url: impl Into<String>, transport: T, codec: C) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(SerialDispatcher { codec, replies: tx });
        Self {
            conn: SocketClient::new(url, transport, dispatcher),
            reply_queue: Mutex::new(rx),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.conn = self.conn.with_config(config);
        self
    }

    pub async fn open(&self) -> Result<(), ClientError> {
        self.conn.open().await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Issue one request, holding the request lock across send-and-receive so
    /// no second request can interleave on the wire.
    pub async fn request(&self, request: &C::Request) -> Result<C::Reply, ClientError> {
        let session = self.conn.open().await?;
        let mut replies = self.reply_queue.lock().await;

        let frame = self.conn.dispatcher().codec.encode_request(request)?;
        session.send(frame).await?;

        match session.wait_with_listener(replies.recv()).await? {
            Some(reply) => Ok(reply),
            None => Err(ClientError::protocol("reply queue closed")),
        }
    }
}
