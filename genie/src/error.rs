use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; never reaches the network. The message is the
    /// notice shown to the user.
    #[error("{0}")]
    Validation(String),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("no document in session")]
    MissingDocument,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
