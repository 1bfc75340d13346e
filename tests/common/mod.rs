//! Test utilities for Camorelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use camorelay::config::{ObfsMode, RelayMode, ServerConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Find a free loopback port by binding and dropping a listener
pub async fn free_tcp_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Find a free loopback UDP port by binding and dropping a socket
pub async fn free_udp_addr() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap()
}

/// Spawn a TCP echo server
pub async fn spawn_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

/// Spawn a UDP echo server
pub async fn spawn_udp_echo() -> SocketAddr {
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

/// Connect to `addr`, retrying while the relay is still binding
pub async fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay at {} never came up", addr);
}

/// Poll `cond` until it holds or two seconds pass
pub async fn wait_until<C: Fn() -> bool>(cond: C) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Test server configuration builder
pub struct TestServerBuilder {
    mode: RelayMode,
    local_addr: String,
    remote_addr: String,
    udp_relay: bool,
    obfs: ObfsMode,
    obfs_host: Option<String>,
    sweep_interval_secs: u64,
}

impl TestServerBuilder {
    /// Create a builder relaying `local` to `remote`
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        TestServerBuilder {
            mode: RelayMode::TcpTun,
            local_addr: local.to_string(),
            remote_addr: remote.to_string(),
            udp_relay: false,
            obfs: ObfsMode::None,
            obfs_host: None,
            sweep_interval_secs: 15,
        }
    }

    /// Set relay mode
    pub fn mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable UDP relay alongside TCP
    pub fn udp_relay(mut self) -> Self {
        self.udp_relay = true;
        self
    }

    /// Set camouflage role and host
    pub fn obfs(mut self, mode: ObfsMode, host: Option<&str>) -> Self {
        self.obfs = mode;
        self.obfs_host = host.map(str::to_string);
        self
    }

    /// Set the UDP sweep interval
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Build the server configuration
    pub fn build(self) -> ServerConfig {
        let mut server = ServerConfig::new(self.mode, &self.local_addr, &self.remote_addr);
        server.udp_relay = self.udp_relay;
        server.obfs.mode = self.obfs;
        server.obfs.host = self.obfs_host;
        server.udp.sweep_interval_secs = self.sweep_interval_secs;
        server
    }
}
