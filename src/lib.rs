//! # Camorelay - Fixed-Target Traffic Relay
//!
//! Camorelay forwards TCP connections and UDP flows from a local address to
//! a fixed remote target. TCP traffic can be wrapped in a fake HTTP/1.1
//! exchange so that the relay leg looks like an ordinary chunked upload.
//!
//! ## Features
//!
//! - **TCP Accept Loop**: One task per connection, graceful stop on shutdown
//! - **UDP Session Multiplexing**: NAT-style table over a single shared socket
//! - **Idle Eviction**: Two-generation mark-and-sweep, 15 seconds by default
//! - **HTTP Camouflage**: Incremental request/reply parsers and envelope builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use camorelay::config::load_config;
//! use camorelay::tunnel::run_servers;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     run_servers(config, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Client -> [local_addr] Camorelay -> (optional HTTP envelope) -> remote_addr
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod obfs;
pub mod relay;
pub mod tunnel;

// Re-export commonly used items
pub use config::{load_config, Config, RelayContext, ServerConfig};
pub use error::{ParseError, RelayError};
pub use tunnel::{run_server, run_servers};

/// Version of the Camorelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "camorelay");
    }
}
