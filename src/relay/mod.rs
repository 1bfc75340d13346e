//! Relay harnesses
//!
//! Generic drivers shared by every server mode: a TCP accept loop and a
//! UDP session multiplexer. Both are parameterized by caller-supplied
//! callbacks and stop when the context's shutdown token fires.

pub mod tcp;
pub mod udp;

pub use tcp::{run_tcp_server, serve_tcp, TcpService};
pub use udp::{run_udp_server, NewSession, RemoteConn, SessionFactory, UdpMultiplexer, UdpSession};
