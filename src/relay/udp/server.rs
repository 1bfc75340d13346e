//! UDP session multiplexer
//!
//! One read loop on a shared socket dispatches datagrams to per-client
//! sessions. Each session relays replies from its remote connection back
//! through the same shared socket.

use super::{NewSession, RemoteConn, SessionTable, UdpSession};
use crate::config::RelayContext;
use crate::error::RelayError;
use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Shortest accepted sweep period; tokio intervals reject zero
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Callbacks supplied by the caller of the multiplexer.
///
/// Only [`create`](SessionFactory::create) is required. The defaults accept
/// every datagram and do nothing with datagrams for existing sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    /// Admission filter run before session lookup. Rejected datagrams are
    /// dropped silently.
    fn check(&self, _packet: &[u8]) -> bool {
        true
    }

    /// Handle a datagram for an existing session
    async fn handle(&self, _session: &UdpSession, _packet: &[u8]) {}

    /// Create a session for the first datagram from `from`.
    ///
    /// `Ok(None)` ignores the datagram. Errors are logged and the datagram is
    /// dropped; they never stop the multiplexer.
    async fn create(&self, packet: &[u8], from: SocketAddr) -> Result<Option<NewSession>>;
}

/// Multiplexer over one bound UDP socket
pub struct UdpMultiplexer<F: SessionFactory> {
    socket: Arc<UdpSocket>,
    ctx: RelayContext,
    factory: Arc<F>,
    sessions: Arc<SessionTable>,
    sweep_interval: Duration,
    buffer_size: usize,
}

impl<F: SessionFactory> UdpMultiplexer<F> {
    /// Create a multiplexer using the context's UDP settings
    pub fn new(socket: UdpSocket, ctx: RelayContext, factory: Arc<F>) -> Self {
        let sweep_interval = ctx.server().udp.sweep_interval().max(MIN_SWEEP_INTERVAL);
        let buffer_size = ctx.server().udp.buffer_size;
        UdpMultiplexer {
            socket: Arc::new(socket),
            ctx,
            factory,
            sessions: Arc::new(SessionTable::new()),
            sweep_interval,
            buffer_size,
        }
    }

    /// Override the sweep interval. Zero is raised to one millisecond.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// Session table, for inspection
    pub fn sessions(&self) -> Arc<SessionTable> {
        self.sessions.clone()
    }

    /// Address of the shared socket
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run until the socket fails or shutdown is signalled.
    ///
    /// Every remaining session is closed before this returns.
    pub async fn run(self) -> Result<(), RelayError> {
        let stop = self.ctx.shutdown_token().child_token();
        let _stop_sweeper = stop.clone().drop_guard();

        tokio::spawn(sweep_sessions(
            self.sessions.clone(),
            self.sweep_interval,
            stop,
        ));

        let result = self.read_loop().await;

        let remaining = self.sessions.drain();
        if !remaining.is_empty() {
            debug!("Closing {} UDP sessions", remaining.len());
        }
        for session in remaining {
            session.close();
        }
        result
    }

    async fn read_loop(&self) -> Result<(), RelayError> {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            let (n, from) = tokio::select! {
                _ = self.ctx.shutdown_signalled() => {
                    info!("UDP relay on {} shutting down", self.ctx.server().display_name());
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!("UDP socket read error: {}", e);
                        return Err(RelayError::Io(e));
                    }
                },
            };
            let packet = &buf[..n];

            if !self.factory.check(packet) {
                trace!("Dropping rejected datagram from {}", from);
                continue;
            }

            if let Some(session) = self.sessions.touch(&from) {
                self.factory.handle(&session, packet).await;
                continue;
            }

            match self.factory.create(packet, from).await {
                Ok(Some(new)) => self.register(from, new),
                Ok(None) => trace!("Ignoring datagram from {}", from),
                Err(e) => {
                    let err = RelayError::SessionCreate(format!("{:#}", e));
                    warn!("Dropping datagram from {}: {}", from, err);
                }
            }
        }
    }

    fn register(&self, from: SocketAddr, new: NewSession) {
        let conn = new.conn.clone();
        let session = Arc::new(UdpSession::new(from, new));
        if let Some(stale) = self.sessions.insert(session.clone()) {
            stale.close();
        }
        debug!("New UDP session for {}", from);

        tokio::spawn(relay_replies(
            session,
            conn,
            self.socket.clone(),
            self.sessions.clone(),
            self.buffer_size,
        ));
    }
}

/// Run a multiplexer with the context's settings
pub async fn run_udp_server<F: SessionFactory>(
    socket: UdpSocket,
    ctx: RelayContext,
    factory: Arc<F>,
) -> Result<(), RelayError> {
    UdpMultiplexer::new(socket, ctx, factory).run().await
}

/// Copy replies from the remote connection to the client until the
/// connection fails or the session is torn down.
async fn relay_replies(
    session: Arc<UdpSession>,
    conn: Arc<dyn RemoteConn>,
    socket: Arc<UdpSocket>,
    sessions: Arc<SessionTable>,
    buffer_size: usize,
) {
    let header = session.take_header().unwrap_or_default();
    let mut buf = vec![0u8; header.len() + buffer_size];
    buf[..header.len()].copy_from_slice(&header);
    let mut prefix = header.len();

    loop {
        let n = tokio::select! {
            _ = session.terminated() => break,
            received = conn.recv(&mut buf[prefix..]) => match received {
                Ok(n) => n,
                Err(e) => {
                    debug!("UDP session {} ended: {}", session.source(), RelayError::RelayRead(e));
                    break;
                }
            },
        };

        if let Err(e) = socket.send_to(&buf[..prefix + n], session.source()).await {
            debug!("UDP reply to {} failed: {}", session.source(), e);
        }
        prefix = 0;
    }

    sessions.remove_session(&session);
    session.close();
    trace!("UDP session {} closed", session.source());
}

async fn sweep_sessions(sessions: Arc<SessionTable>, period: Duration, stop: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = sessions.sweep();
                if !evicted.is_empty() {
                    debug!("Evicting {} idle UDP sessions", evicted.len());
                }
                for session in evicted {
                    session.close();
                }
            }
        }
    }
}
