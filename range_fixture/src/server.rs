//! Fixture Server Implementation
//!
//! `FixtureServer` exposes one [`SyntheticStream`] over HTTP as a single file.
//! Every path and every method is answered with that file, so `GET /` and
//! `POST /some/path` both reach the responder.
//! Requests are answered by a [`ContentResponder`], so clients see ordinary
//! range and conditional semantics.
//!
//! # Example
//!
//! ```no_run
//! use range_fixture::{FixtureConfig, FixtureServer};
//!
//! #[tokio::main]
//! async fn main() -> range_fixture::Result<()> {
//!     let server = FixtureServer::new(FixtureConfig::with_layout(16, 8, 64))?;
//!     let listener = server.bind().await?;
//!     server.serve(listener, std::future::pending()).await
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use synthetic_stream::SyntheticStream;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{CursorMode, FixtureConfig};
use crate::content::SharedStream;
use crate::error::{FixtureServerError, Result};
use crate::responder::ContentResponder;

#[derive(Clone)]
struct ServerState {
    stream: SharedStream,
    cursor_mode: CursorMode,
    responder: Arc<ContentResponder>,
}

impl ServerState {
    fn content_for_request(&self) -> SharedStream {
        match self.cursor_mode {
            CursorMode::Shared => self.stream.clone(),
            CursorMode::PerRequest => self.stream.fresh(),
        }
    }
}

/// Any method, any path
///
/// Serves the synthetic content with range and conditional support.
async fn serve_file(State(state): State<ServerState>, method: Method, headers: HeaderMap) -> Response {
    let content = state.content_for_request();
    state.responder.respond(&method, &headers, content)
}

/// An HTTP server serving one synthetic file.
pub struct FixtureServer {
    config: FixtureConfig,
    stream: SharedStream,
    responder: Arc<ContentResponder>,
}

impl FixtureServer {
    /// Creates a server with a new stream laid out as the config describes.
    pub fn new(config: FixtureConfig) -> Result<Self> {
        let stream = SyntheticStream::new(config.block_size, config.block_count, config.extra_len)?;
        Ok(Self::from_stream(stream, config))
    }

    /// Creates a server around an existing stream. The layout fields of `config`
    /// are ignored.
    pub fn from_stream(stream: SyntheticStream, config: FixtureConfig) -> Self {
        let responder = ContentResponder::new(config.file_name.clone())
            .with_modified(config.modified)
            .with_etag(config.etag.clone());

        Self {
            config,
            stream: SharedStream::new(stream),
            responder: Arc::new(responder),
        }
    }

    /// The stream shared by requests in [`CursorMode::Shared`].
    pub fn stream(&self) -> SharedStream {
        self.stream.clone()
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Every path and method reaches the responder; the method only matters to the
    /// conditional headers and to HEAD.
    fn create_router(&self) -> Router {
        Router::new()
            .fallback(serve_file)
            .layer(TraceLayer::new_for_http())
            .with_state(ServerState {
                stream: self.stream.clone(),
                cursor_mode: self.config.cursor_mode,
                responder: self.responder.clone(),
            })
    }

    /// Binds the configured address. Port 0 picks an ephemeral port.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| FixtureServerError::BindError { addr, source })
    }

    /// Serves requests on `listener` until `shutdown` completes, then waits for
    /// in-flight requests to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Fixture server listening on {addr}");

        let router = self.create_router();
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Fixture server on {addr} stopped");
        Ok(())
    }

    /// Serves until a message (or the sender being dropped) arrives on `shutdown_rx`.
    pub async fn run_until_stopped(self, listener: TcpListener, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.serve(listener, async {
            let _ = shutdown_rx.await;
        })
        .await
    }
}
