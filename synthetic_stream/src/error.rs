use std::io;

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("End of stream")]
    Exhausted,

    #[error("Seek target is negative")]
    InvalidOffset,

    #[error("Unsupported seek mode: {0}")]
    InvalidMode(i32),

    #[error("Invalid stream layout: block_size={block_size}, block_count={block_count}, extra_len={extra_len}")]
    InvalidLayout {
        block_size: u64,
        block_count: u64,
        extra_len: u64,
    },
}

pub type Result<T> = std::result::Result<T, StreamError>;

impl From<StreamError> for io::Error {
    fn from(value: StreamError) -> Self {
        // Exhaustion and negative seek targets share the end-of-stream signal.
        let kind = match value {
            StreamError::Exhausted | StreamError::InvalidOffset => io::ErrorKind::UnexpectedEof,
            StreamError::InvalidMode(_) | StreamError::InvalidLayout { .. } => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, value)
    }
}
