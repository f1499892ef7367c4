use thiserror::Error;

/// Client error taxonomy.
///
/// `Clone` is required because a single listener failure is fanned out to every
/// request and subscription waiting on the same session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Transport-level failure (connect, send, receive, timeout). Fatal to the
    /// current session; surfaced to every outstanding waiter.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Well-formed frame with invalid semantics: undecodable payload,
    /// unexpected response tag, explicit error reply, unknown correlation id.
    /// Local to the call that triggered it.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// API misuse: double-subscribe, unsubscribe of an unknown channel.
    #[error("usage error: {0}")]
    Usage(String),
}

impl ClientError {
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(format!("JSON error: {e}"))
    }
}
