//! Test harness: a fixture server on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::FixtureConfig;
use crate::content::SharedStream;
use crate::error::{FixtureServerError, Result};
use crate::server::FixtureServer;

/// Stops a running fixture server.
///
/// Dropping the handle signals the server to stop without waiting for it.
pub struct ShutdownHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
    timeout: Option<Duration>,
}

impl ShutdownHandle {
    /// Stops accepting connections and waits for in-flight requests to finish.
    ///
    /// Without a configured timeout this waits indefinitely. With one, the server
    /// task is aborted once it elapses and `ShutdownTimedOut` is returned.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let joined = match self.timeout {
            None => task.await,
            Some(timeout) => {
                let abort = task.abort_handle();
                match tokio::time::timeout(timeout, task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Fixture server did not stop within {timeout:?}, aborting");
                        abort.abort();
                        return Err(FixtureServerError::ShutdownTimedOut(timeout));
                    },
                }
            },
        };

        joined?
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A fixture server running on a spawned tokio task.
///
/// # Example
///
/// ```ignore
/// let server = TestServer::start(16, 8, 64).await;
/// let response = reqwest::get(server.base_url()).await?;
/// assert_eq!(response.headers()["content-length"], "192");
/// server.shutdown().await?;
/// ```
pub struct TestServer {
    base_url: String,
    local_addr: SocketAddr,
    stream: SharedStream,
    shutdown: ShutdownHandle,
}

impl TestServer {
    /// Starts a server on `127.0.0.1` with an OS-assigned port.
    ///
    /// # Panics
    ///
    /// If the port cannot be bound; a test environment without a free port is unusable.
    pub async fn start(block_size: u64, block_count: u64, extra_len: u64) -> Self {
        Self::try_start(FixtureConfig::with_layout(block_size, block_count, extra_len))
            .await
            .expect("Failed to start fixture server")
    }

    pub async fn try_start(config: FixtureConfig) -> Result<Self> {
        let timeout = config.shutdown_timeout;
        let server = FixtureServer::new(config)?;
        let listener = server.bind().await?;
        let local_addr = listener.local_addr()?;
        let stream = server.stream();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(server.run_until_stopped(listener, shutdown_rx));

        let base_url = format!("http://{local_addr}/");
        info!("Started fixture server at {base_url}");

        Ok(Self {
            base_url,
            local_addr,
            stream,
            shutdown: ShutdownHandle {
                shutdown_tx: Some(shutdown_tx),
                task: Some(task),
                timeout,
            },
        })
    }

    /// The URL of the served file, e.g. `http://127.0.0.1:12345/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The stream shared by requests, for inspecting its cursor.
    pub fn stream(&self) -> &SharedStream {
        &self.stream
    }

    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.shutdown().await
    }

    pub fn into_parts(self) -> (String, ShutdownHandle) {
        (self.base_url, self.shutdown)
    }
}

/// Starts a fixture server and returns its URL together with its shutdown handle.
pub async fn start_test_server(block_size: u64, block_count: u64, extra_len: u64) -> (String, ShutdownHandle) {
    TestServer::start(block_size, block_count, extra_len).await.into_parts()
}
