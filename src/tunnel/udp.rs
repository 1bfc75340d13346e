//! UDP tunnel: forward each client flow to a fixed target

use super::RemoteAddr;
use crate::helper::connect_udp;
use crate::relay::{NewSession, SessionFactory, UdpSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Session factory that gives every client address its own connected
/// socket towards the configured remote address.
#[derive(Debug, Clone)]
pub struct UdpTunnel {
    remote: RemoteAddr,
}

impl UdpTunnel {
    /// Create a tunnel towards `remote_addr`
    pub fn new(remote_addr: &str) -> Self {
        UdpTunnel {
            remote: RemoteAddr::new(remote_addr),
        }
    }
}

#[async_trait]
impl SessionFactory for UdpTunnel {
    fn check(&self, packet: &[u8]) -> bool {
        !packet.is_empty()
    }

    async fn handle(&self, session: &UdpSession, packet: &[u8]) {
        if let Err(e) = session.send(packet).await {
            debug!("UDP send for {} failed: {}", session.source(), e);
        }
    }

    async fn create(&self, packet: &[u8], from: SocketAddr) -> Result<Option<NewSession>> {
        let target = self.remote.resolve().await?;
        let socket = connect_udp(target)
            .await
            .with_context(|| format!("Failed to open UDP flow to {}", target))?;
        socket
            .send(packet)
            .await
            .with_context(|| format!("Failed to forward first datagram to {}", target))?;

        debug!("UDP flow {} -> {} opened", from, target);
        Ok(Some(NewSession::new(Arc::new(socket))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelayContext, RelayMode, ServerConfig};
    use crate::relay::UdpMultiplexer;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    async fn udp_echo() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while let Ok((n, from)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&buf[..n], from).await;
            }
        });
        addr
    }

    #[test]
    fn test_check_rejects_empty() {
        let tunnel = UdpTunnel::new("127.0.0.1:53");
        assert!(!tunnel.check(b""));
        assert!(tunnel.check(b"q"));
    }

    #[tokio::test]
    async fn test_udp_tunnel_echo() {
        let echo = udp_echo().await;
        let ctx = RelayContext::new(ServerConfig::new(
            RelayMode::UdpTun,
            "127.0.0.1:0",
            &echo.to_string(),
        ));
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mux = UdpMultiplexer::new(socket, ctx.clone(), Arc::new(UdpTunnel::new(&echo.to_string())));
        let addr = mux.local_addr().unwrap();
        let sessions = mux.sessions();
        let server = tokio::spawn(mux.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 64];
        for payload in [&b"first"[..], b"second", b"third"] {
            client.send_to(payload, addr).await.unwrap();
            let (n, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..n], payload);
            assert_eq!(from, addr);
        }
        assert_eq!(sessions.len(), 1);

        ctx.shutdown();
        server.await.unwrap().unwrap();
    }
}
