#![cfg_attr(feature = "strict", deny(warnings))]

//! A virtual, randomly-accessible byte source with no backing storage.
//!
//! The content is a pure function of position: the first `block_size * block_count`
//! bytes are organised in blocks, each filled with its own index (mod 256), followed
//! by `extra_len` zero bytes. Every byte is computed on demand, so arbitrary byte
//! ranges can be served without materializing the content.

mod error;
mod stream;

pub use error::{Result, StreamError};
pub use stream::{Signal, Status, SyntheticStream, Whence};
