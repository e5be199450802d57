//! Content store errors

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API endpoint exposes no master ref")]
    MissingMasterRef,

    #[error("unknown pagination cursor: {0}")]
    UnknownCursor(String),

    #[error("CMS endpoint is not configured")]
    MissingEndpoint,

    #[error(transparent)]
    Io(#[from] io::Error),
}
