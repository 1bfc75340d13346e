//! Server configuration types
//!
//! Defines the configuration of the relay servers run by one process.

use super::{TcpConfig, UdpConfig};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Relay servers to run
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Validate every server entry
    pub fn validate(&self) -> Result<(), String> {
        if self.servers.is_empty() {
            return Err("No [[server]] entries configured".to_string());
        }
        for server in &self.servers {
            server
                .validate()
                .map_err(|e| format!("{}: {}", server.display_name(), e))?;
        }
        Ok(())
    }
}

/// Relay mode of a server
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RelayMode {
    /// Forward TCP connections to a fixed target
    #[default]
    TcpTun,
    /// Forward UDP flows to a fixed target
    UdpTun,
}

/// Which end of the HTTP camouflage this server plays
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ObfsMode {
    /// Plain relay, no camouflage
    #[default]
    None,
    /// Send a request envelope upstream and expect a reply envelope
    HttpClient,
    /// Expect a request envelope from clients and answer with a reply envelope
    HttpServer,
}

/// HTTP camouflage configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ObfsConfig {
    /// Camouflage role
    #[serde(default)]
    pub mode: ObfsMode,

    /// `Host` header sent by the client side
    #[serde(default)]
    pub host: Option<String>,
}

/// Configuration of a single relay server
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Nickname used in log lines
    #[serde(default)]
    pub name: Option<String>,

    /// Relay mode
    #[serde(default)]
    pub mode: RelayMode,

    /// Local listen address (e.g. "0.0.0.0:8388")
    pub local_addr: String,

    /// Remote target address
    pub remote_addr: String,

    /// Also relay UDP on the same local address (tcp-tun only)
    #[serde(default)]
    pub udp_relay: bool,

    /// HTTP camouflage
    #[serde(default)]
    pub obfs: ObfsConfig,

    /// TCP socket settings
    #[serde(default)]
    pub tcp: TcpConfig,

    /// UDP multiplexer settings
    #[serde(default)]
    pub udp: UdpConfig,
}

impl ServerConfig {
    /// Create a server configuration with default settings
    pub fn new(mode: RelayMode, local_addr: &str, remote_addr: &str) -> Self {
        ServerConfig {
            name: None,
            mode,
            local_addr: local_addr.to_string(),
            remote_addr: remote_addr.to_string(),
            udp_relay: false,
            obfs: ObfsConfig::default(),
            tcp: TcpConfig::default(),
            udp: UdpConfig::default(),
        }
    }

    /// Name for log lines: the nickname, or the listen address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.local_addr)
    }

    /// Whether a UDP multiplexer should run for this server
    pub fn runs_udp(&self) -> bool {
        self.mode == RelayMode::UdpTun || self.udp_relay
    }

    /// Whether a TCP harness should run for this server
    pub fn runs_tcp(&self) -> bool {
        self.mode == RelayMode::TcpTun
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.local_addr.is_empty() {
            return Err("local_addr is empty".to_string());
        }
        if self.remote_addr.is_empty() {
            return Err("remote_addr is empty".to_string());
        }
        if self.udp.sweep_interval_secs == 0 {
            return Err("udp.sweep_interval_secs must be positive".to_string());
        }
        if self.udp.buffer_size == 0 {
            return Err("udp.buffer_size must be positive".to_string());
        }
        if self.mode == RelayMode::UdpTun && self.obfs.mode != ObfsMode::None {
            return Err("HTTP camouflage only applies to tcp-tun".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_new() {
        let config = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:1080", "10.0.0.1:80");
        assert_eq!(config.display_name(), "127.0.0.1:1080");
        assert!(config.runs_tcp());
        assert!(!config.runs_udp());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_udp_relay() {
        let mut config = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:1080", "10.0.0.1:80");
        config.udp_relay = true;
        assert!(config.runs_tcp());
        assert!(config.runs_udp());

        let config = ServerConfig::new(RelayMode::UdpTun, "127.0.0.1:53", "8.8.8.8:53");
        assert!(!config.runs_tcp());
        assert!(config.runs_udp());
    }

    #[test]
    fn test_server_config_validate() {
        let config = ServerConfig::new(RelayMode::TcpTun, "", "10.0.0.1:80");
        assert!(config.validate().is_err());

        let config = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:1", "");
        assert!(config.validate().is_err());

        let mut config = ServerConfig::new(RelayMode::UdpTun, "127.0.0.1:53", "8.8.8.8:53");
        config.obfs.mode = ObfsMode::HttpServer;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::new(RelayMode::UdpTun, "127.0.0.1:53", "8.8.8.8:53");
        config.udp.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_empty() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_display_name_nickname() {
        let mut config = ServerConfig::new(RelayMode::TcpTun, "127.0.0.1:1080", "10.0.0.1:80");
        config.name = Some("edge".to_string());
        assert_eq!(config.display_name(), "edge");
    }
}
