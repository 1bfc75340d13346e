//! Helper utilities for Camorelay
//!
//! Socket setup and stream relaying shared by the harnesses and tunnels.

use crate::config::TcpConfig;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpStream, UdpSocket};
use tracing::debug;

/// Listen backlog for TCP listeners
pub const LISTEN_BACKLOG: i32 = 1024;

/// Socket options applied to relayed TCP connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs).filter(|&s| s > 0),
            keepalive_interval: Some(config.keepalive_interval).filter(|&s| s > 0),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Resolve `addr` to its first socket address
pub async fn resolve_addr(addr: &str) -> io::Result<SocketAddr> {
    lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("No addresses found for: {}", addr),
        )
    })
}

/// Bind a TCP listener with SO_REUSEADDR
pub async fn bind_tcp_listener(addr: &str) -> io::Result<TcpListener> {
    let addr = resolve_addr(addr).await?;
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

/// Bind a UDP socket on `addr`
pub async fn bind_udp_socket(addr: &str) -> io::Result<UdpSocket> {
    let addr = resolve_addr(addr).await?;
    UdpSocket::bind(addr).await
}

/// Bind an ephemeral UDP socket connected to `target`
pub async fn connect_udp(target: SocketAddr) -> io::Result<UdpSocket> {
    let local: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    Ok(socket)
}

/// Relay data bidirectionally between two streams.
///
/// `a_to_b` holds bytes already read from `a` that must reach `b` before
/// the copy starts. Returns the byte counts copied in each direction.
pub async fn relay_streams<A, B>(mut a: A, mut b: B, a_to_b: &[u8]) -> io::Result<(u64, u64)>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    if !a_to_b.is_empty() {
        b.write_all(a_to_b).await?;
    }
    let (up, down) = tokio::io::copy_bidirectional(&mut a, &mut b).await?;
    debug!("Relay finished: {} bytes up, {} bytes down", up, down);
    Ok((up + a_to_b.len() as u64, down))
}
