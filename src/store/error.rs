use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("operation timed out")]
    Timeout,
    #[error("connection closed by server")]
    ConnectionClosed,
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error(
        "consistency not met: {acknowledged} of {required} replicas \
         acknowledged"
    )]
    ConsistencyNotMet { required: usize, acknowledged: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "resp")]
impl From<redis_protocol::error::RedisProtocolError> for StoreError {
    fn from(e: redis_protocol::error::RedisProtocolError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}
