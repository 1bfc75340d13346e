//! TCP tunnel: forward each connection to a fixed target

use super::RemoteAddr;
use crate::config::{ObfsMode, RelayContext};
use crate::helper::{relay_streams, SocketOpts};
use crate::obfs::{read_reply, read_request, write_request, write_response};
use crate::relay::TcpService;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Relays accepted connections to the configured remote address, with
/// optional HTTP camouflage on the relay leg.
#[derive(Debug, Clone)]
pub struct TcpTunnel {
    remote: RemoteAddr,
}

impl TcpTunnel {
    /// Create a tunnel towards `remote_addr`
    pub fn new(remote_addr: &str) -> Self {
        TcpTunnel {
            remote: RemoteAddr::new(remote_addr),
        }
    }

    async fn connect(&self, ctx: &RelayContext) -> Result<TcpStream> {
        let tcp = &ctx.server().tcp;
        let target = self.remote.resolve().await?;

        let connected = tokio::time::timeout(tcp.connect_timeout(), TcpStream::connect(target))
            .await
            .with_context(|| format!("Connection timeout to {}", self.remote.addr()));
        let stream = match connected {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.remote.invalidate().await;
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to connect to {}", self.remote.addr())));
            }
            Err(e) => {
                self.remote.invalidate().await;
                return Err(e);
            }
        };

        SocketOpts::from_tcp_config(tcp).apply(&stream)?;
        debug!("TCP connection established to {}", target);
        Ok(stream)
    }

    async fn relay(&self, mut client: TcpStream, peer: SocketAddr, ctx: &RelayContext) -> Result<()> {
        let server = ctx.server();
        if let Err(e) = SocketOpts::from_tcp_config(&server.tcp).apply(&client) {
            warn!("Failed to apply socket options for {}: {}", peer, e);
        }

        let (up, down) = match server.obfs.mode {
            ObfsMode::None => {
                let remote = self.connect(ctx).await?;
                relay_streams(client, remote, &[]).await?
            }
            ObfsMode::HttpClient => {
                let mut remote = self.connect(ctx).await?;
                let host = server
                    .obfs
                    .host
                    .as_deref()
                    .unwrap_or_else(|| host_part(self.remote.addr()));
                write_request(&mut remote, Some(host)).await?;
                let (reply, body) = read_reply(&mut remote)
                    .await
                    .context("Failed to read HTTP reply envelope")?;
                if reply.status_code() != 200 {
                    bail!("Remote answered {}", reply.first_line());
                }
                client.write_all(&body).await?;
                let (up, down) = relay_streams(client, remote, &[]).await?;
                (up, down + body.len() as u64)
            }
            ObfsMode::HttpServer => {
                let (request, body) = read_request(&mut client)
                    .await
                    .context("Failed to read HTTP request envelope")?;
                debug!("{} sent {}", peer, request.first_line());
                let remote = self.connect(ctx).await?;
                write_response(&mut client).await?;
                relay_streams(client, remote, &body).await?
            }
        };

        debug!("Connection from {} closed: {} bytes up, {} bytes down", peer, up, down);
        Ok(())
    }
}

/// Host portion of a `host:port` address, brackets kept for IPv6
fn host_part(addr: &str) -> &str {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => addr,
    }
}

#[async_trait]
impl TcpService for TcpTunnel {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr, ctx: RelayContext) {
        if let Err(e) = self.relay(stream, peer, &ctx).await {
            debug!("Relay for {} ended: {:#}", peer, e);
        }
    }
}
