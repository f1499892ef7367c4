pub mod client;
pub mod protocol;

pub use client::{channels, IndexerClient, RecordStream, TradeRecord, TradeStream, INDEXER_WS_URL};
pub use protocol::{
    ChannelEvent, Connected, Data, ErrorMsg, IndexerCodec, IndexerMessage, IndexerReply,
    Subscribed, Unsubscribed,
};
