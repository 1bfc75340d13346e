//! Transport configuration types
//!
//! Socket-level settings for the TCP and UDP sides of a relay server.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// Default connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Default sweep interval for idle UDP sessions
fn default_sweep_interval_secs() -> u64 {
    15
}

/// Default datagram buffer size
fn default_buffer_size() -> usize {
    2048
}

fn default_true() -> bool {
    true
}

/// TCP transport configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_true")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,

    /// Timeout for dialing the remote endpoint, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: true,
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl TcpConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// UDP session multiplexer configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Interval of the idle-session sweep in seconds.
    ///
    /// A silent session is evicted after one to two intervals.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Size of the datagram read buffers
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            sweep_interval_secs: default_sweep_interval_secs(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl UdpConfig {
    /// Sweep interval as a [`Duration`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
