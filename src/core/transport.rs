use crate::core::errors::ClientError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::instrument;

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000, // 10 seconds
        }
    }
}

impl WsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Transport trait - pure connection establishment.
///
/// The framework only ever asks a transport to connect; the resulting sink and
/// stream halves are owned by the session (sink) and its listener task
/// (stream) and used concurrently.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Sink: TransportSink;
    type Stream: TransportStream;

    /// Establish one physical connection.
    async fn connect(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Self::Sink, Self::Stream), ClientError>;
}

/// Write half of a connection.
#[async_trait]
pub trait TransportSink: Send + 'static {
    async fn send(&mut self, msg: Message) -> Result<(), ClientError>;

    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Read half of a connection. `None` means the peer closed the connection.
#[async_trait]
pub trait TransportStream: Send + 'static {
    async fn next(&mut self) -> Option<Result<Message, ClientError>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tungstenite-based transport.
#[derive(Debug, Default, Clone)]
pub struct TungsteniteTransport;

pub struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

pub struct TungsteniteStream {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    type Sink = TungsteniteSink;
    type Stream = TungsteniteStream;

    #[instrument(skip(self), fields(url = %url))]
    async fn connect(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Self::Sink, Self::Stream), ClientError> {
        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| ClientError::connectivity("WebSocket connection timeout"))?
            .map_err(|e| ClientError::connectivity(format!("WebSocket connection failed: {e}")))?;

        let (write, read) = ws_stream.split();
        Ok((TungsteniteSink { write }, TungsteniteStream { read }))
    }
}

#[async_trait]
impl TransportSink for TungsteniteSink {
    async fn send(&mut self, msg: Message) -> Result<(), ClientError> {
        self.write.send(msg).await.map_err(|e| {
            ClientError::connectivity(format!("failed to send WebSocket message: {e}"))
        })
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        let _ = self.write.send(Message::Close(None)).await;
        Ok(())
    }
}

#[async_trait]
impl TransportStream for TungsteniteStream {
    async fn next(&mut self) -> Option<Result<Message, ClientError>> {
        loop {
            match self.read.next().await {
                // Pings are answered by tungstenite's protocol machine; both
                // control frames are invisible above the transport.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(other)) => return Some(Ok(other)),
                Some(Err(e)) => {
                    return Some(Err(ClientError::connectivity(format!(
                        "WebSocket error: {e}"
                    ))))
                }
                None => return None,
            }
        }
    }
}
