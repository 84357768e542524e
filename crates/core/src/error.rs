use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("{0}")]
    Other(String),
}
