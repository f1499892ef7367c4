mod common;

use common::{indexer_responder, MockTransport};
use futures::future::join_all;
use muxstream::core::errors::ClientError;
use muxstream::indexer::IndexerClient;

#[tokio::test]
async fn concurrent_opens_share_one_connect() {
    let (transport, handle) = MockTransport::new();
    let client = IndexerClient::with_transport("ws://mock", transport);

    let results = join_all((0..5).map(|_| client.open())).await;
    for res in results {
        res.unwrap();
    }
    assert_eq!(handle.connects(), 1);

    // Already opened: still no second connect.
    client.open().await.unwrap();
    assert_eq!(handle.connects(), 1);
}

#[tokio::test]
async fn concurrent_opens_share_one_failure() {
    let (transport, handle) = MockTransport::new();
    handle.fail_connects(true);
    let client = IndexerClient::with_transport("ws://mock", transport);

    let results = join_all((0..3).map(|_| client.open())).await;
    for res in results {
        assert_eq!(
            res.unwrap_err(),
            ClientError::connectivity("mock connect refused")
        );
    }
    assert_eq!(handle.connects(), 1);

    // The failed attempt is not sticky: a later open retries.
    handle.fail_connects(false);
    client.open().await.unwrap();
    assert_eq!(handle.connects(), 2);
}

#[tokio::test]
async fn close_is_idempotent_and_reopen_builds_a_fresh_session() {
    let (transport, handle) = MockTransport::new();
    let client = IndexerClient::with_transport("ws://mock", transport);

    // Closing a never-opened client is a no-op.
    client.close().await.unwrap();
    assert_eq!(handle.connects(), 0);

    client.open().await.unwrap();
    client.close().await.unwrap();
    client.close().await.unwrap();
    assert_eq!(handle.connects(), 1);

    client.open().await.unwrap();
    assert_eq!(handle.connects(), 2);
}

#[tokio::test]
async fn session_survives_undeliverable_frames() {
    let (transport, handle) = MockTransport::new();
    handle.set_responder(indexer_responder());
    let client = IndexerClient::with_transport("ws://mock", transport);
    client.open().await.unwrap();

    // Garbage and an unknown-channel event must not kill the listener.
    handle.push(tokio_tungstenite::tungstenite::Message::Text(
        "not json".to_owned(),
    ));
    handle.push_json(&common::channel_data("v4_orderbook", serde_json::json!({})));

    // The session is still usable afterwards.
    let (ack, _events) = client
        .subscribe("v4_markets", muxstream::SubscribeOptions::default())
        .await
        .unwrap();
    assert_eq!(ack.channel, "v4_markets");
    assert_eq!(handle.connects(), 1);
}
