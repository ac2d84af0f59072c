use std::time::Duration;

use crate::responder::ModifiedTime;

/// How requests share the stream cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    /// All requests seek and read one stream. Concurrent requests interleave.
    #[default]
    Shared,
    /// Every request gets a fresh stream with the same layout.
    PerRequest,
}

/// Configuration for the fixture server.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Network interface to bind to.
    pub host: String,
    /// TCP port; 0 lets the OS pick one.
    pub port: u16,
    /// Bytes per block of the synthetic content.
    pub block_size: u64,
    /// Number of full blocks.
    pub block_count: u64,
    /// Zero-filled bytes after the blocks.
    pub extra_len: u64,
    /// Name the content is served under. Its extension picks the content type.
    pub file_name: String,
    pub modified: ModifiedTime,
    /// Entity tag sent as `ETag` and used by the conditional headers.
    pub etag: Option<String>,
    pub cursor_mode: CursorMode,
    /// Upper bound on the graceful shutdown wait. `None` waits for as long as
    /// in-flight requests take.
    pub shutdown_timeout: Option<Duration>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            block_size: 16,
            block_count: 8,
            extra_len: 64,
            file_name: "file.bin".to_string(),
            modified: ModifiedTime::Now,
            etag: None,
            cursor_mode: CursorMode::Shared,
            shutdown_timeout: None,
        }
    }
}

impl FixtureConfig {
    /// Default configuration with the given content layout.
    pub fn with_layout(block_size: u64, block_count: u64, extra_len: u64) -> Self {
        Self {
            block_size,
            block_count,
            extra_len,
            ..Default::default()
        }
    }

    /// Returns the bind address as "host:port".
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
