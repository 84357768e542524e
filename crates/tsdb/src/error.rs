use thiserror::Error;

#[derive(Debug, Error)]
pub enum TsdbError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("write rejected: {status}: {body}")]
    WriteRejected { status: u16, body: String },

    #[error("query failed: {status}: {body}")]
    QueryFailed { status: u16, body: String },

    #[error("response parse error: {0}")]
    Parse(String),
}
