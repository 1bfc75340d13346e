//! Session table keyed by client address

use super::UdpSession;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Active sessions of one UDP server.
///
/// Every access goes through a single mutex that is held only for the map
/// operation itself, never across I/O. Sessions returned for eviction must
/// be closed by the caller after the lock is released.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<SocketAddr, Arc<UdpSession>>>,
}

impl SessionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, HashMap<SocketAddr, Arc<UdpSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the session for `source` and mark it live
    pub fn touch(&self, source: &SocketAddr) -> Option<Arc<UdpSession>> {
        let sessions = self.inner();
        let session = sessions.get(source)?;
        session.mark_live();
        Some(session.clone())
    }

    /// Look up the session for `source` without touching liveness
    pub fn get(&self, source: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.inner().get(source).cloned()
    }

    /// Register a session under its source address.
    ///
    /// Returns the session previously registered for that address, if any.
    pub fn insert(&self, session: Arc<UdpSession>) -> Option<Arc<UdpSession>> {
        self.inner().insert(session.source(), session)
    }

    /// Remove the entry for `source`
    pub fn remove(&self, source: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.inner().remove(source)
    }

    /// Remove `session` if it is still the registered entry for its address
    pub fn remove_session(&self, session: &Arc<UdpSession>) -> bool {
        let mut sessions = self.inner();
        match sessions.get(&session.source()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&session.source());
                true
            }
            _ => false,
        }
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.inner().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    /// One mark-and-sweep pass.
    ///
    /// Live sessions are demoted and kept; sessions already demoted by the
    /// previous pass are removed and returned. A silent session therefore
    /// survives between one and two sweep intervals.
    pub fn sweep(&self) -> Vec<Arc<UdpSession>> {
        let mut evicted = Vec::new();
        self.inner().retain(|_, session| {
            if session.clear_live() {
                true
            } else {
                evicted.push(session.clone());
                false
            }
        });
        evicted
    }

    /// Remove and return every session
    pub fn drain(&self) -> Vec<Arc<UdpSession>> {
        self.inner().drain().map(|(_, session)| session).collect()
    }
}
