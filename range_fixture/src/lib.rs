#![cfg_attr(feature = "strict", deny(warnings))]

//! HTTP Range Fixture
//!
//! A deterministic HTTP server used to exercise range-request and conditional-request
//! handling in download clients. It serves a single virtual file, `file.bin`, whose
//! bytes come from a [`SyntheticStream`](synthetic_stream::SyntheticStream).
//!
//! # Components
//!
//! - [`ContentResponder`]: answers 200/206/304/412/416 from any [`ContentSource`]
//! - [`FixtureServer`]: the axum server wiring the responder to a shared stream
//! - [`TestServer`]: starts a server on an ephemeral port and hands back its URL
//!
//! # Concurrency
//!
//! By default every request reads through one shared stream cursor. Each seek and
//! read is individually synchronized but requests are not, so the fixture is meant
//! for one client issuing requests sequentially. Use [`CursorMode::PerRequest`] for
//! isolated cursors.

mod config;
mod content;
mod error;
pub mod responder;
mod server;
mod test_server;

pub use config::{CursorMode, FixtureConfig};
pub use content::{ContentSource, SharedStream};
pub use error::{FixtureServerError, Result};
pub use responder::{ContentResponder, ModifiedTime};
pub use server::FixtureServer;
pub use test_server::{ShutdownHandle, TestServer, start_test_server};
