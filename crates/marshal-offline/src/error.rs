//! Error types for the offline queue and sync

use ulid::Ulid;

/// Queue persistence and payload errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Reading or writing the backing file failed
    #[error("queue storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic replace of the backing file failed
    #[error("queue storage persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Queue document or payload did not (de)serialize
    #[error("queue serialization: {0}")]
    Serde(#[from] serde_json::Error),

    /// Action id not in the queue
    #[error("no queued action {0}")]
    UnknownAction(Ulid),
}

/// Outcome of one failed send
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("server responded {0}")]
    Status(u16),

    /// Request did not reach the server
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the per-attempt timeout
    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether the action can never succeed as sent (any 4xx)
    #[inline]
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Status(code) if (400..500).contains(code))
    }

    /// HTTP-style status, if the server answered
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            Self::Network(_) | Self::Timeout => None,
        }
    }
}
