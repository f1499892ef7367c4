use crate::core::codec::{Classified, StreamCodec, SubscribeOptions};
use crate::core::errors::ClientError;
use crate::core::registry::SubscriptionRegistry;
use crate::core::session::{Dispatch, Session, SocketClient};
use crate::core::transport::{Transport, TransportSink, WsConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// Dispatcher side of the streaming client: responses go to the shared reply
/// queue, channel events to the matching registry queue.
pub struct StreamDispatcher<C: StreamCodec> {
    codec: C,
    replies: mpsc::UnboundedSender<C::Reply>,
    registry: SubscriptionRegistry<C::Event>,
}

impl<C: StreamCodec> Dispatch for StreamDispatcher<C> {
    fn dispatch(&self, frame: Message) -> Result<(), ClientError> {
        match self.codec.classify(frame)? {
            Some(Classified::Response(reply)) => {
                let _ = self.replies.send(reply);
            }
            Some(Classified::Event { channel, data }) => {
                self.registry.publish(&channel, data);
            }
            None => {}
        }
        Ok(())
    }
}

/// Streaming pub/sub client with serialized request/response control calls.
///
/// Subscriptions multiplex any number of named channels over the one
/// connection; control frames (subscribe, unsubscribe, anything issued through
/// `request`) are serialized under a lock since the control protocol carries
/// no correlation id.
pub struct StreamsClient<T: Transport, C: StreamCodec> {
    conn: SocketClient<T, StreamDispatcher<C>>,
    reply_queue: Mutex<mpsc::UnboundedReceiver<C::Reply>>,
}

impl<T: Transport, C: StreamCodec> StreamsClient<T, C> {
    pub fn new(url: impl Into<String>, transport: T, codec: C) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(StreamDispatcher {
            codec,
            replies: tx,
            registry: SubscriptionRegistry::new(),
        });
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

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.conn.dispatcher().registry.contains(channel)
    }

    /// Issue one already-encoded control request and wait for its reply,
    /// serialized under the request lock.
    pub async fn request(&self, frame: Message) -> Result<C::Reply, ClientError> {
        let session = self.conn.open().await?;
        self.request_on(&session, frame).await
    }

    async fn request_on(
        &self,
        session: &Session<T::Sink>,
        frame: Message,
    ) -> Result<C::Reply, ClientError> {
        let mut replies = self.reply_queue.lock().await;
        session.send(frame).await?;
        match session.wait_with_listener(replies.recv()).await? {
            Some(reply) => Ok(reply),
            None => Err(ClientError::protocol("reply queue closed")),
        }
    }

    /// Subscribe to `channel`: returns the server's acknowledgement together
    /// with the lazy stream of subsequent events.
    ///
    /// The delivery queue is registered before the control frame is sent, so
    /// an event arriving ahead of the acknowledgement cannot be lost. Fails
    /// with a usage error if the channel is already subscribed (single-owner
    /// policy) and with a protocol error if the server rejects the
    /// subscription; either way no registry entry is left behind.
    pub async fn subscribe(
        &self,
        channel: &str,
        options: SubscribeOptions,
    ) -> Result<(C::Reply, EventStream<T::Sink, C::Event>), ClientError> {
        let session = self.conn.open().await?;
        let dispatcher = self.conn.dispatcher();

        let rx = dispatcher.registry.insert(channel)?;
        let attempt = async {
            let frame = dispatcher.codec.subscribe_frame(channel, &options)?;
            let reply = self.request_on(&session, frame).await?;
            dispatcher.codec.accept_subscription(reply)
        };
        match attempt.await {
            Ok(ack) => Ok((
                ack,
                EventStream {
                    session: Arc::clone(&session),
                    rx,
                },
            )),
            Err(e) => {
                let _ = dispatcher.registry.remove(channel);
                Err(e)
            }
        }
    }

    /// Unsubscribe from `channel`. The registry entry is removed before the
    /// control frame goes out, so the consumer is told to stop without waiting
    /// on the network round trip. Fails with a usage error if the channel was
    /// never subscribed.
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), ClientError> {
        let dispatcher = self.conn.dispatcher();
        dispatcher.registry.remove(channel)?;
        let session = self.conn.open().await?;
        let frame = dispatcher.codec.unsubscribe_frame(channel)?;
        session.send(frame).await
    }
}

/// Lazy, non-restartable sequence of events for one subscription.
///
/// `next` yields `Some(Ok(event))` per delivered event in arrival order,
/// `Some(Err(..))` if the session's listener dies while we wait, and `None`
/// once the channel has been unsubscribed and the queue drained.
pub struct EventStream<S: TransportSink, E> {
    session: Arc<Session<S>>,
    rx: mpsc::UnboundedReceiver<E>,
}

impl<S: TransportSink, E> EventStream<S, E> {
    pub async fn next(&mut self) -> Option<Result<E, ClientError>> {
        match self.session.wait_with_listener(self.rx.recv()).await {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
