use crate::core::codec::RpcCodec;
use crate::core::correlation::CorrelationTable;
use crate::core::errors::ClientError;
use crate::core::session::{Dispatch, SocketClient};
use crate::core::transport::{Transport, WsConfig};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

/// Dispatcher side of the multiplexed client: decode `(id, reply)` and resolve
/// the matching pending slot.
pub struct RpcDispatcher<C: RpcCodec> {
    codec: C,
    table: CorrelationTable<C::Reply>,
}

impl<C: RpcCodec> Dispatch for RpcDispatcher<C> {
    fn dispatch(&self, frame: Message) -> Result<(), ClientError> {
        match self.codec.decode_reply(frame)? {
            Some((id, reply)) => self.table.resolve(id, reply),
            None => Ok(()),
        }
    }
}

/// ID-multiplexed request/response client.
///
/// Any number of requests may be in flight on the one connection; correlation
/// ids pair each caller with exactly its own reply, whatever order replies
/// arrive in.
pub struct MultiplexClient<T: Transport, C: RpcCodec> {
    conn: SocketClient<T, RpcDispatcher<C>>,
}

impl<T: Transport, C: RpcCodec> MultiplexClient<T, C> {
    pub fn new(url: impl Into<String>, transport: T, codec: C) -> Self {
        let dispatcher = Arc::new(RpcDispatcher {
            codec,
            table: CorrelationTable::new(),
        });
        Self {
            conn: SocketClient::new(url, transport, dispatcher),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.conn = self.conn.with_config(config);
        self
    }

    /// Open the underlying session (lazy, single-flight). Requests open it on
    /// demand; calling this eagerly is optional.
    pub async fn open(&self) -> Result<(), ClientError> {
        self.conn.open().await.map(|_| ())
    }

    /// Close the underlying session. A later `open()` or `request()` builds a
    /// brand-new one.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Issue one request and suspend until its correlated reply arrives or the
    /// session dies. The pending entry is cleaned up on every exit path.
    pub async fn request(&self, request: &C::Request) -> Result<C::Reply, ClientError> {
        let session = self.conn.open().await?;
        let dispatcher = self.conn.dispatcher();

        let (id, rx) = dispatcher.table.register();
        let frame = match dispatcher.codec.encode_request(id, request) {
            Ok(frame) => frame,
            Err(e) => {
                dispatcher.table.discard(id);
                return Err(e);
            }
        };
        if let Err(e) = session.send(frame).await {
            dispatcher.table.discard(id);
            return Err(e);
        }

        let res = session.wait_with_listener(rx).await;
        dispatcher.table.discard(id);
        match res {
            Ok(Ok(reply)) => Ok(reply),
            // Sender dropped without resolving: the slot was discarded out
            // from under us.
            Ok(Err(_)) => Err(ClientError::protocol("reply slot dropped before resolution")),
            Err(e) => Err(e),
        }
    }

    /// Number of requests currently awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.conn.dispatcher().table.len()
    }
}
