//! Shared per-server handle passed to harness callbacks

use super::ServerConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Configuration handle shared by a server's harnesses and callbacks.
///
/// Cloning is cheap. The shutdown token is one-shot: once cancelled it stays
/// cancelled, and any number of tasks may wait on it.
#[derive(Debug, Clone)]
pub struct RelayContext {
    server: Arc<ServerConfig>,
    shutdown: CancellationToken,
}

impl RelayContext {
    /// Create a context with its own shutdown token
    pub fn new(server: ServerConfig) -> Self {
        Self::with_shutdown(server, CancellationToken::new())
    }

    /// Create a context that shuts down with `shutdown`
    pub fn with_shutdown(server: ServerConfig, shutdown: CancellationToken) -> Self {
        RelayContext {
            server: Arc::new(server),
            shutdown,
        }
    }

    /// Server configuration
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Shutdown token
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Fire the shutdown signal
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been signalled
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolve once shutdown has been signalled
    pub async fn shutdown_signalled(&self) {
        self.shutdown.cancelled().await
    }
}
