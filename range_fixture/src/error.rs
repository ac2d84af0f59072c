use std::time::Duration;

use synthetic_stream::StreamError;
use thiserror::Error;
use tokio::task::JoinError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FixtureServerError {
    #[error("Stream Error: {0}")]
    StreamError(#[from] StreamError),

    #[error("Failed to bind to {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    JoinError(#[from] JoinError),

    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimedOut(Duration),
}

pub type Result<T> = std::result::Result<T, FixtureServerError>;
