pub mod core;
pub mod indexer;

pub use crate::core::codec::{Classified, RpcCodec, SerialCodec, StreamCodec, SubscribeOptions};
pub use crate::core::errors::ClientError;
pub use crate::core::multiplex::MultiplexClient;
pub use crate::core::serial::SerialClient;
pub use crate::core::streams::{EventStream, StreamsClient};
pub use crate::core::transport::{
    Transport, TransportSink, TransportStream, TungsteniteTransport, WsConfig,
};
pub use crate::indexer::IndexerClient;
