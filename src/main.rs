//! httpwire demonstration server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──TCP──▶ net::Listener ──▶ connection task
//!                                          │
//!                                          ├─▶ http::reader   (accumulation buffer)
//!                                          │     └─▶ http::request → http::headers
//!                                          │
//!                                          ├─▶ demo::DemoHandler
//!                                          │     └─▶ upstream (reqwest) for /httpbin/
//!                                          │
//!     Client ◀──TCP── http::response ◀─────┘
//! ```
//!
//! Runs until SIGINT or SIGTERM, then closes the listener.

use std::path::PathBuf;

use clap::Parser;

use httpwire::config::{load_config, validate_config, ConfigError, ServerConfig};
use httpwire::demo::{DemoHandler, Upstream, DEFAULT_UPSTREAM};
use httpwire::lifecycle::wait_for_shutdown_signal;
use httpwire::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "httpwire")]
#[command(about = "HTTP/1.1 server built directly on TCP", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,

    /// Directory holding static assets such as vim.mp4.
    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Base URL relayed under /httpbin/.
    #[arg(long, default_value = DEFAULT_UPSTREAM)]
    upstream: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);

    tracing::info!("httpwire v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        read_buffer_size = config.connection.read_buffer_size,
        read_timeout_secs = config.connection.read_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handler = DemoHandler::new(cli.assets_dir, Upstream::new(&cli.upstream)?);
    let mut server = httpwire::serve_with_config(config, handler).await?;
    tracing::info!(address = %server.local_addr(), "Server started");

    wait_for_shutdown_signal().await;

    server.close().await;
    tracing::info!(
        in_flight = server.active_connections(),
        "Server gracefully stopped"
    );
    Ok(())
}
