//! UDP session multiplexing
//!
//! A NAT-style table maps each client address seen on a shared socket to a
//! session with its own remote connection. Idle sessions are evicted by a
//! periodic two-generation sweep.

mod server;
mod session;
mod table;

pub use server::{run_udp_server, SessionFactory, UdpMultiplexer};
pub use session::{CleanupFn, NewSession, RemoteConn, UdpSession};
pub use table::SessionTable;
