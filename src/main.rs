//! Camorelay - Fixed-Target Traffic Relay
//!
//! This is the main entry point for the Camorelay application.

use anyhow::{bail, Result};
use camorelay::config::{load_config, Config, ObfsMode, RelayMode, ServerConfig};
use camorelay::tunnel::run_servers;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Camorelay - TCP/UDP relay with optional HTTP camouflage
#[derive(Parser, Debug)]
#[command(name = "camorelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, conflicts_with_all = ["local_addr", "remote_addr"])]
    config: Option<PathBuf>,

    /// Local listen address
    #[arg(short = 'l', long, requires = "remote_addr")]
    local_addr: Option<String>,

    /// Remote target address
    #[arg(short = 's', long, requires = "local_addr")]
    remote_addr: Option<String>,

    /// Relay mode
    #[arg(short, long, value_enum, default_value_t = RelayMode::TcpTun)]
    mode: RelayMode,

    /// Also relay UDP on the local address in tcp-tun mode
    #[arg(short = 'u', long)]
    udp_relay: bool,

    /// HTTP camouflage role
    #[arg(long, value_enum, default_value_t = ObfsMode::None)]
    obfs: ObfsMode,

    /// Host header sent in http-client mode
    #[arg(long)]
    obfs_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

impl Args {
    /// Build the configuration from a file or from the command line
    fn into_config(self) -> Result<Config> {
        if let Some(path) = &self.config {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            return Ok(config);
        }

        let (Some(local), Some(remote)) = (&self.local_addr, &self.remote_addr) else {
            bail!("Either --config or both --local-addr and --remote-addr are required");
        };

        let mut server = ServerConfig::new(self.mode, local, remote);
        server.udp_relay = self.udp_relay;
        server.obfs.mode = self.obfs;
        server.obfs.host = self.obfs_host;

        let config = Config {
            servers: vec![server],
        };
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    info!("Camorelay v{}", camorelay::VERSION);
    let config = args.into_config()?;
    for server in &config.servers {
        info!(
            "Server {}: {:?} {} -> {}",
            server.display_name(),
            server.mode,
            server.local_addr,
            server.remote_addr
        );
    }

    // Setup shutdown signal
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    // Run the servers
    if let Err(e) = run_servers(config, shutdown).await {
        error!("Relay stopped: {}", e);
        return Err(e.into());
    }
    info!("Shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                    _ = shutdown.cancelled() => return,
                }
            }
            Err(e) => {
                error!("Failed to setup SIGTERM handler: {}", e);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = shutdown.cancelled() => return,
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = shutdown.cancelled() => return,
        }
    }

    shutdown.cancel();
}

/// Setup logging based on configuration.
///
/// `RUST_LOG` takes precedence over `--log-level` when set.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
