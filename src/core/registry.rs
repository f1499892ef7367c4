use crate::core::errors::ClientError;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Channel registry for the subscription facade: single-owner policy.
///
/// Each channel name maps to at most one delivery queue. Subscribing to an
/// already-subscribed channel and unsubscribing a never-subscribed channel are
/// usage errors. Removing a channel drops the queue's sender; the consumer may
/// still drain items queued before removal, then observes end-of-stream and
/// stops cleanly - absence from the registry is the sentinel, not an error.
pub struct SubscriptionRegistry<S> {
    channels: Mutex<HashMap<String, mpsc::UnboundedSender<S>>>,
}

impl<S> Default for SubscriptionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SubscriptionRegistry<S> {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh delivery queue for `channel`.
    pub fn insert(&self, channel: &str) -> Result<mpsc::UnboundedReceiver<S>, ClientError> {
        let mut channels = self.channels.lock().unwrap();
        if channels.contains_key(channel) {
            return Err(ClientError::usage(format!(
                "channel already subscribed: {channel}"
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        channels.insert(channel.to_owned(), tx);
        Ok(rx)
    }

    /// Remove `channel`, terminating its consumer's iteration.
    pub fn remove(&self, channel: &str) -> Result<(), ClientError> {
        match self.channels.lock().unwrap().remove(channel) {
            Some(_) => Ok(()),
            None => Err(ClientError::usage(format!(
                "channel not subscribed: {channel}"
            ))),
        }
    }

    /// Enqueue one event for `channel`, FIFO. Events for channels that are not
    /// (or no longer) registered are dropped; an unsubscribe races the last
    /// few server pushes by design.
    pub fn publish(&self, channel: &str, event: S) {
        let channels = self.channels.lock().unwrap();
        match channels.get(channel) {
            Some(tx) => {
                // A send error means the consumer is gone but the entry is
                // still present (its task was dropped mid-iteration).
                let _ = tx.send(event);
            }
            None => debug!(channel, "dropping event for unsubscribed channel"),
        }
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.lock().unwrap().contains_key(channel)
    }
}
