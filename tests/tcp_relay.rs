//! End-to-end TCP relaying through configured servers

mod common;

use camorelay::config::{Config, ObfsMode};
use camorelay::error::RelayError;
use camorelay::tunnel::{run_server, run_servers};
use common::*;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_plain_tcp_relay() {
    let echo = spawn_tcp_echo().await;
    let local = free_tcp_addr().await;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(run_server(
        TestServerBuilder::new(local, echo).build(),
        shutdown.clone(),
    ));

    let mut conn = connect_with_retry(local).await;
    conn.write_all(b"hello relay").await.unwrap();
    let mut buf = [0u8; 11];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello relay");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_camouflaged_chain() {
    let echo = spawn_tcp_echo().await;
    let server_side = free_tcp_addr().await;
    let client_side = free_tcp_addr().await;

    let config = Config {
        servers: vec![
            TestServerBuilder::new(server_side, echo)
                .obfs(ObfsMode::HttpServer, None)
                .build(),
            TestServerBuilder::new(client_side, server_side)
                .obfs(ObfsMode::HttpClient, Some("www.example.com"))
                .build(),
        ],
    };
    let shutdown = CancellationToken::new();
    let servers = tokio::spawn(run_servers(config, shutdown.clone()));

    // Make sure both ends are listening before relaying
    drop(connect_with_retry(server_side).await);
    let mut conn = connect_with_retry(client_side).await;

    let payload = vec![0xabu8; 64 * 1024];
    conn.write_all(&payload).await.unwrap();
    let mut echoed = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), conn.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, payload);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), servers)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_listen_conflict_stops_everything() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let echo = spawn_tcp_echo().await;
    let healthy = free_tcp_addr().await;

    let config = Config {
        servers: vec![
            TestServerBuilder::new(healthy, echo).build(),
            TestServerBuilder::new(occupied.local_addr().unwrap(), echo).build(),
        ],
    };
    let shutdown = CancellationToken::new();
    let result = tokio::time::timeout(Duration::from_secs(2), run_servers(config, shutdown.clone()))
        .await
        .unwrap();

    assert!(matches!(result, Err(RelayError::Bind { .. })));
    assert!(shutdown.is_cancelled());
}
