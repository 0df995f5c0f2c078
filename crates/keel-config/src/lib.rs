#![allow(clippy::must_use_candidate)]

pub mod auth;
pub mod cors;
mod duration;
mod env;
pub mod jobs;
mod loader;
pub mod rate_limit;
pub mod server;
pub mod storage;
pub mod telemetry;

use serde::Deserialize;

pub use auth::*;
pub use cors::*;
pub use env::ExpandError;
pub use jobs::*;
pub use rate_limit::*;
pub use server::*;
pub use storage::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig, TracingConfig};

/// Top-level keel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    /// Credential verification; requests stay anonymous without it
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
