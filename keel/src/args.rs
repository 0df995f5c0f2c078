use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Keel API server
#[derive(Debug, Parser)]
#[command(name = "keel", about = "HTTP backend with typed dispatch and a standard middleware chain")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "keel.toml", env = "KEEL_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "KEEL_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter directive, takes precedence over `RUST_LOG`
    #[arg(long, env = "KEEL_LOG")]
    pub log_filter: Option<String>,
}
