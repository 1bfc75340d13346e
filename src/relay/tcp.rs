//! TCP accept-loop harness
//!
//! Binds once, then hands every accepted connection to its own task. The
//! harness stops accepting when shutdown is signalled but never aborts
//! handlers that are already running.

use crate::config::RelayContext;
use crate::error::RelayError;
use crate::helper::bind_tcp_listener;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// The `listen`/`handle` pair driven by the harness
#[async_trait]
pub trait TcpService: Send + Sync + 'static {
    /// Produce a bound listener for `addr`
    async fn listen(&self, addr: &str, _ctx: &RelayContext) -> io::Result<TcpListener> {
        bind_tcp_listener(addr).await
    }

    /// Serve one accepted connection to completion
    async fn handle(&self, stream: TcpStream, peer: SocketAddr, ctx: RelayContext);
}

/// Bind `addr` through the service and run the accept loop.
///
/// A bind failure is returned as [`RelayError::Bind`]; the server has no
/// purpose without its listener.
pub async fn run_tcp_server<S: TcpService>(
    addr: &str,
    ctx: RelayContext,
    service: Arc<S>,
) -> Result<(), RelayError> {
    let listener = match service.listen(addr, &ctx).await {
        Ok(listener) => listener,
        Err(source) => {
            error!("Failed to listen on {}: {}", addr, source);
            return Err(RelayError::Bind {
                addr: addr.to_string(),
                source,
            });
        }
    };

    serve_tcp(listener, ctx, service).await
}

/// Run the accept loop on an already bound listener.
///
/// Returns `Ok(())` on shutdown and [`RelayError::Accept`] when accepting
/// fails. The listener is closed on return either way.
pub async fn serve_tcp<S: TcpService>(
    listener: TcpListener,
    ctx: RelayContext,
    service: Arc<S>,
) -> Result<(), RelayError> {
    match listener.local_addr() {
        Ok(local) => info!("TCP relay listening on {}", local),
        Err(_) => info!("TCP relay listening"),
    }

    loop {
        tokio::select! {
            _ = ctx.shutdown_signalled() => {
                info!("TCP relay on {} shutting down", ctx.server().display_name());
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let service = service.clone();
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        service.handle(stream, peer, ctx).await;
                    });
                }
                Err(e) => {
                    warn!("Accept failed, stopping listener: {}", e);
                    return Err(RelayError::Accept(e));
                }
            },
        }
    }
}
