use crate::core::codec::SubscribeOptions;
use crate::core::errors::ClientError;
use crate::core::streams::{EventStream, StreamsClient};
use crate::core::transport::{Transport, TungsteniteTransport, WsConfig};
use crate::indexer::protocol::{ChannelEvent, IndexerCodec, IndexerReply, Subscribed};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Production indexer WebSocket endpoint.
pub const INDEXER_WS_URL: &str = "wss://indexer.dydx.trade/v4/ws";

/// Channel names understood by the indexer.
pub mod channels {
    pub const TRADES: &str = "v4_trades";
    pub const ORDERBOOK: &str = "v4_orderbook";
    pub const MARKETS: &str = "v4_markets";
    pub const CANDLES: &str = "v4_candles";
    pub const SUBACCOUNTS: &str = "v4_subaccounts";
    pub const BLOCK_HEIGHT: &str = "v4_block_height";
}

/// Indexer streaming client.
///
/// Thin typed layer over [`StreamsClient`] with the indexer codec: subscribe
/// calls return the acknowledgement's snapshot plus a stream of individual
/// records, with pre-batched frames expanded transparently.
pub struct IndexerClient<T: Transport = TungsteniteTransport> {
    inner: StreamsClient<T, IndexerCodec>,
}

impl IndexerClient<TungsteniteTransport> {
    /// Client against the production indexer endpoint.
    pub fn new() -> Self {
        Self::with_url(INDEXER_WS_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            inner: StreamsClient::new(url, TungsteniteTransport, IndexerCodec),
        }
    }
}

impl Default for IndexerClient<TungsteniteTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> IndexerClient<T> {
    /// Client over a custom transport (tests drive this with a scripted one).
    pub fn with_transport(url: impl Into<String>, transport: T) -> Self {
        Self {
            inner: StreamsClient::new(url, transport, IndexerCodec),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.inner = self.inner.with_config(config);
        self
    }

    pub async fn open(&self) -> Result<(), ClientError> {
        self.inner.open().await
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.inner.close().await
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.inner.is_subscribed(channel)
    }

    /// Issue a raw control request (already shaped as the indexer expects) and
    /// wait for its reply.
    pub async fn request(&self, payload: &Value) -> Result<IndexerReply, ClientError> {
        let frame =
            tokio_tungstenite::tungstenite::Message::Text(serde_json::to_string(payload)?);
        self.inner.request(frame).await
    }

    /// Subscribe to `channel`; returns the acknowledgement (with its initial
    /// snapshot in `contents`) and the record stream.
    pub async fn subscribe(
        &self,
        channel: &str,
        options: SubscribeOptions,
    ) -> Result<(Subscribed, RecordStream<T>), ClientError> {
        let (ack, events) = self.inner.subscribe(channel, options).await?;
        let IndexerReply::Subscribed(subscribed) = ack else {
            // accept_subscription only lets Subscribed through.
            return Err(ClientError::protocol("subscribe ack was not 'subscribed'"));
        };
        Ok((
            subscribed,
            RecordStream {
                events,
                buffer: VecDeque::new(),
            },
        ))
    }

    pub async fn unsubscribe(&self, channel: &str) -> Result<(), ClientError> {
        self.inner.unsubscribe(channel).await
    }

    /// Subscribe to trades for one market: the snapshot of recent trades plus
    /// a stream of trade updates, batched server-side.
    pub async fn trades(
        &self,
        market: &str,
    ) -> Result<(Vec<TradeRecord>, TradeStream<T>), ClientError> {
        let options = SubscribeOptions::default().with_id(market).batched(true);
        let (ack, records) = self.subscribe(channels::TRADES, options).await?;
        let snapshot: TradesContents = serde_json::from_value(ack.contents)?;
        Ok((snapshot.trades, TradeStream { records }))
    }
}

/// Stream of individual records for one subscription.
///
/// `channel_batch_data` frames arrive as arrays; this stream expands them so
/// the consumer always sees one record at a time, in wire order.
pub struct RecordStream<T: Transport = TungsteniteTransport> {
    events: EventStream<T::Sink, ChannelEvent>,
    buffer: VecDeque<Value>,
}

impl<T: Transport> std::fmt::Debug for RecordStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RecordStream<T> {
    pub async fn next(&mut self) -> Option<Result<Value, ClientError>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            let event = match self.events.next().await? {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            if event.batched {
                match event.contents {
                    Value::Array(records) => self.buffer.extend(records),
                    other => {
                        return Some(Err(ClientError::protocol(format!(
                            "expected batched array, got: {other}"
                        ))))
                    }
                }
            } else {
                return Some(Ok(event.contents));
            }
        }
    }
}

/// One trade, as carried in both the subscription snapshot and updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub side: String,
    pub size: String,
    pub price: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub created_at_height: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TradesContents {
    #[serde(default)]
    trades: Vec<TradeRecord>,
}

/// Typed stream over `v4_trades` records.
pub struct TradeStream<T: Transport = TungsteniteTransport> {
    records: RecordStream<T>,
}

impl<T: Transport> TradeStream<T> {
    /// Next batch of trades. Each wire record carries a list of trades that
    /// landed in one block.
    pub async fn next(&mut self) -> Option<Result<Vec<TradeRecord>, ClientError>> {
        let record = match self.records.next().await? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        Some(
            serde_json::from_value::<TradesContents>(record)
                .map(|c| c.trades)
                .map_err(Into::into),
        )
    }
}
