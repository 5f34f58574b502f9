use thiserror::Error;

/// Errors surfaced by the core. Mirrors the error kinds enumerated for the
/// hook graph and publication paths: callers branch on `NotFound` the same
/// way bootstrap and the hook graph do, so it needs to be a real variant and
/// not a string match.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found")]
    NotFound,

    #[error("validation: {0}")]
    Validation(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cluster returned an error response: {0}")]
    ClusterResponse(String),

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<nkeys::error::Error> for Error {
    fn from(e: nkeys::error::Error) -> Self {
        Error::Crypto(e.to_string())
    }
}

impl From<async_nats::Error> for Error {
    fn from(e: async_nats::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
