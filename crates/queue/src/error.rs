//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("envelope parse error: {0}")]
    Parse(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("acknowledge error: {0}")]
    Ack(String),
}
