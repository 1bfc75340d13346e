//! Tunnel servers
//!
//! Plugs the fixed-target TCP and UDP tunnels into the relay harnesses and
//! runs every configured server until shutdown.

mod addr;
mod tcp;
mod udp;

pub use addr::RemoteAddr;
pub use tcp::TcpTunnel;
pub use udp::UdpTunnel;

use crate::config::{Config, RelayContext, ServerConfig};
use crate::error::RelayError;
use crate::helper::bind_udp_socket;
use crate::relay::{run_tcp_server, run_udp_server};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run one server's harnesses until shutdown or failure.
///
/// A bind failure cancels `shutdown` so the rest of the process stops too.
pub async fn run_server(server: ServerConfig, shutdown: CancellationToken) -> Result<(), RelayError> {
    server.validate().map_err(RelayError::Config)?;
    let ctx = RelayContext::with_shutdown(server, shutdown.child_token());
    let local = ctx.server().local_addr.clone();
    let remote = ctx.server().remote_addr.clone();
    let mut tasks = JoinSet::new();

    if ctx.server().runs_udp() {
        let socket = match bind_udp_socket(&local).await {
            Ok(socket) => socket,
            Err(source) => {
                error!("Failed to bind UDP socket on {}: {}", local, source);
                shutdown.cancel();
                return Err(RelayError::Bind { addr: local, source });
            }
        };
        info!(
            "Running UDP relay {} at {} -> {}",
            ctx.server().display_name(),
            local,
            remote
        );
        tasks.spawn(run_udp_server(socket, ctx.clone(), Arc::new(UdpTunnel::new(&remote))));
    }

    if ctx.server().runs_tcp() {
        info!(
            "Running TCP relay {} at {} -> {} (obfs: {:?})",
            ctx.server().display_name(),
            local,
            remote,
            ctx.server().obfs.mode
        );
        let ctx = ctx.clone();
        let tunnel = Arc::new(TcpTunnel::new(&remote));
        tasks.spawn(async move { run_tcp_server(&local, ctx, tunnel).await });
    }

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if e.is_fatal() {
                    shutdown.cancel();
                }
                error!("{}: {}", ctx.server().display_name(), e);
                result = Err(e);
            }
            Err(e) => {
                error!("{}: relay task failed: {}", ctx.server().display_name(), e);
            }
        }
    }
    result
}

/// Run every configured server until `shutdown` fires.
///
/// Returns the first fatal error, if any.
pub async fn run_servers(config: Config, shutdown: CancellationToken) -> Result<(), RelayError> {
    let mut servers = JoinSet::new();
    for server in config.servers {
        servers.spawn(run_server(server, shutdown.clone()));
    }

    let mut fatal = None;
    while let Some(joined) = servers.join_next().await {
        if let Ok(Err(e)) = joined {
            if e.is_fatal() && fatal.is_none() {
                fatal = Some(e);
            }
        }
    }
    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayMode;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_run_server_stops_on_shutdown() {
        let mut server = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:0", "127.0.0.1:9");
        server.udp_relay = true;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_server(server, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal_for_all_servers() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = taken.local_addr().unwrap().to_string();

        let healthy = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:0", "127.0.0.1:9");
        let conflicting = ServerConfig::new(RelayMode::TcpTun, &taken_addr, "127.0.0.1:9");
        let config = Config {
            servers: vec![healthy, conflicting],
        };

        let shutdown = CancellationToken::new();
        let err = tokio::time::timeout(Duration::from_secs(2), run_servers(config, shutdown.clone()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RelayError::Bind { .. }));
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_invalid_server_rejected() {
        let server = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:0", "");
        let err = run_server(server, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
