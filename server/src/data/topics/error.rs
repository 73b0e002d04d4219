//! Topic error types

use std::fmt;

/// Error type for topic operations
#[derive(Debug, PartialEq, Eq)]
pub enum TopicError {
    /// Channel closed
    ChannelClosed,
    /// Byte budget exhausted (backpressure)
    BufferFull,
    /// Receiver lagged behind and skipped this many messages
    Lagged(u64),
    /// Topic exists with different message type
    TypeMismatch(String),
    /// Stream topic consumer was already taken
    AlreadySubscribed(String),
}

impl std::error::Error for TopicError {}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicError::ChannelClosed => write!(f, "channel closed"),
            TopicError::BufferFull => write!(f, "buffer full"),
            TopicError::Lagged(n) => write!(f, "receiver lagged by {} messages", n),
            TopicError::TypeMismatch(name) => {
                write!(f, "topic '{}' already exists with different type", name)
            }
            TopicError::AlreadySubscribed(name) => {
                write!(f, "stream topic '{}' already has a consumer", name)
            }
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for TopicError {
    fn from(err: tokio::sync::broadcast::error::RecvError) -> Self {
        match err {
            tokio::sync::broadcast::error::RecvError::Closed => TopicError::ChannelClosed,
            tokio::sync::broadcast::error::RecvError::Lagged(n) => TopicError::Lagged(n),
        }
    }
}
