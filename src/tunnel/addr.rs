//! Remote address with cached resolution

use crate::helper::resolve_addr;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Remote target that resolves once and reuses the result.
///
/// A failed connection should call [`RemoteAddr::invalidate`] so the next
/// attempt re-resolves.
#[derive(Debug, Clone)]
pub struct RemoteAddr {
    addr: String,
    cached: Arc<RwLock<Option<SocketAddr>>>,
}

impl RemoteAddr {
    /// Create an unresolved address
    pub fn new(addr: &str) -> Self {
        RemoteAddr {
            addr: addr.to_string(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// The configured address string
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Resolve, using the cache when available
    pub async fn resolve(&self) -> Result<SocketAddr> {
        if let Some(cached) = *self.cached.read().await {
            return Ok(cached);
        }

        let resolved = resolve_addr(&self.addr)
            .await
            .with_context(|| format!("Failed to resolve address: {}", self.addr))?;
        *self.cached.write().await = Some(resolved);
        Ok(resolved)
    }

    /// Drop the cached resolution
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
