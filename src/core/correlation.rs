use crate::core::errors::ClientError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

/// Pending-request table for ID-multiplexed request/response.
///
/// Correlation ids come from a monotonic counter and are never reused. Each id
/// maps to a single-assignment slot that the listener resolves exactly once;
/// the entry is removed at resolution time, so a reply for an id that is no
/// longer present (already consumed, or its caller cancelled) is a recoverable
/// protocol error, logged and dropped.
///
/// Written by exactly two actors - the issuing caller at registration time and
/// the listener at dispatch time - so a plain mutex around the map (never held
/// across an await) is all the locking needed.
pub struct CorrelationTable<R> {
    counter: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<R>>>,
}

impl<R> Default for CorrelationTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CorrelationTable<R> {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh correlation id and register its result slot.
    pub fn register(&self) -> (u64, oneshot::Receiver<R>) {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Resolve the slot for `id` with the decoded reply. Called by the
    /// listener.
    pub fn resolve(&self, id: u64, reply: R) -> Result<(), ClientError> {
        let Some(slot) = self.pending.lock().unwrap().remove(&id) else {
            return Err(ClientError::protocol(format!(
                "reply for unknown correlation id {id}"
            )));
        };
        if slot.send(reply).is_err() {
            // The caller's wait was abandoned (listener race lost, or the
            // caller was cancelled); the orphaned reply is discarded.
            warn!(id, "discarding reply for abandoned request");
        }
        Ok(())
    }

    /// Drop the slot for `id`, if still present. Callers invoke this on every
    /// exit path so no entry outlives its request.
    pub fn discard(&self, id: u64) {
        self.pending.lock().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}
