//! A single client flow multiplexed over the shared UDP socket

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{self, Debug};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Hook run once when a session is torn down
pub type CleanupFn = Box<dyn FnOnce() + Send + 'static>;

/// Connection-like handle to the remote peer of a session.
///
/// A session owns its remote connection exclusively; nothing outside the
/// session reads from or writes to it.
#[async_trait]
pub trait RemoteConn: Send + Sync + Debug {
    /// Send one datagram to the remote peer
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Receive one datagram from the remote peer
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the connection. Called exactly once, at session teardown.
    fn close(&self) {}
}

#[async_trait]
impl RemoteConn for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }
}

/// What a session factory hands back for a new client address
pub struct NewSession {
    /// Remote connection for the flow
    pub conn: Arc<dyn RemoteConn>,
    /// Optional teardown hook
    pub cleanup: Option<CleanupFn>,
    /// Bytes prepended to the first reply sent to the client
    pub header: Bytes,
}

impl NewSession {
    /// Session with no cleanup hook and no pending header
    pub fn new(conn: Arc<dyn RemoteConn>) -> Self {
        NewSession {
            conn,
            cleanup: None,
            header: Bytes::new(),
        }
    }

    /// Attach a teardown hook
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Attach bytes to echo back before the first reply
    pub fn with_header(mut self, header: impl Into<Bytes>) -> Self {
        self.header = header.into();
        self
    }
}

impl Debug for NewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSession")
            .field("conn", &self.conn)
            .field("cleanup", &self.cleanup.is_some())
            .field("header", &self.header.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One client address and its remote flow.
///
/// Teardown is idempotent: the first call to [`UdpSession::close`] wins a
/// compare-and-set and runs the sequence; every later call is a no-op.
pub struct UdpSession {
    source: SocketAddr,
    conn: Mutex<Option<Arc<dyn RemoteConn>>>,
    live: AtomicBool,
    closed: AtomicBool,
    terminated: CancellationToken,
    header: Mutex<Option<Bytes>>,
    cleanup: Mutex<Option<CleanupFn>>,
}

impl UdpSession {
    /// Create a live session answering to `source`
    pub fn new(source: SocketAddr, new: NewSession) -> Self {
        let header = if new.header.is_empty() {
            None
        } else {
            Some(new.header)
        };
        UdpSession {
            source,
            conn: Mutex::new(Some(new.conn)),
            live: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            terminated: CancellationToken::new(),
            header: Mutex::new(header),
            cleanup: Mutex::new(new.cleanup),
        }
    }

    /// Client address this session answers to
    pub fn source(&self) -> SocketAddr {
        self.source
    }

    /// Remote connection, or `None` once torn down
    pub fn conn(&self) -> Option<Arc<dyn RemoteConn>> {
        lock(&self.conn).clone()
    }

    /// Forward a datagram to the remote peer
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        match self.conn() {
            Some(conn) => conn.send(buf).await,
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "UDP session already closed",
            )),
        }
    }

    /// Record inbound traffic
    pub fn mark_live(&self) {
        self.live.store(true, Ordering::Release);
    }

    /// Clear the liveness flag, returning its previous value
    pub(crate) fn clear_live(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    /// Whether traffic arrived since the last sweep
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Take the pending header. Returns it at most once.
    pub fn take_header(&self) -> Option<Bytes> {
        lock(&self.header).take()
    }

    /// Whether teardown has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve once the session has been torn down
    pub async fn terminated(&self) {
        self.terminated.cancelled().await
    }

    /// Termination token, cancelled exactly once at teardown
    pub fn termination_token(&self) -> CancellationToken {
        self.terminated.clone()
    }

    /// Tear the session down.
    ///
    /// Closes the remote connection, fires the termination signal and runs
    /// the cleanup hook. Returns `true` only for the call that did the work.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let conn = lock(&self.conn).take();
        if let Some(conn) = conn {
            conn.close();
        }
        self.terminated.cancel();

        let cleanup = lock(&self.cleanup).take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        true
    }
}

impl Debug for UdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpSession")
            .field("source", &self.source)
            .field("live", &self.is_live())
            .field("closed", &self.is_closed())
            .finish()
    }
}
