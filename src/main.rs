use muxstream::indexer::{channels, IndexerClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = IndexerClient::new();

    println!("Subscribing to BTC-USD trades...");
    let (snapshot, mut stream) = client.trades("BTC-USD").await?;
    println!("Snapshot: {} recent trades", snapshot.len());
    for trade in snapshot.iter().take(5) {
        println!("  {} {} @ {}", trade.side, trade.size, trade.price);
    }

    let mut seen = 0;
    while seen < 20 {
        match stream.next().await {
            Some(Ok(trades)) => {
                for trade in trades {
                    println!("Trade: {} {} @ {}", trade.side, trade.size, trade.price);
                    seen += 1;
                }
            }
            Some(Err(e)) => {
                eprintln!("Stream error: {e}");
                break;
            }
            None => break,
        }
    }

    client.unsubscribe(channels::TRADES).await?;
    client.close().await?;
    Ok(())
}
