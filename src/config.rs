//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::proxy::{CorsPolicy, DEFAULT_TIMEOUT};
use crate::store::NodeRegistry;

#[derive(Debug, Clone, Parser)]
#[command(name = "node-gateway")]
#[command(about = "Proxy a fleet of traffic-monitoring agents behind one JSON API")]
#[command(version)]
pub struct Config {
    /// Address the API listens on.
    #[arg(long, env = "GATEWAY_LISTEN", default_value = "0.0.0.0:8787")]
    pub listen: SocketAddr,

    /// Address for /healthz and /readyz. Disabled when unset.
    #[arg(long, env = "GATEWAY_HEALTH_LISTEN")]
    pub health_listen: Option<SocketAddr>,

    /// JSON node map: {"<id>": {"name", "url", "api_key"}}.
    #[arg(long, env = "NODES_CONFIG", default_value = "{}", hide_env_values = true)]
    pub nodes_config: String,

    /// File holding the JSON node map. Takes precedence over --nodes-config.
    #[arg(long, env = "NODES_CONFIG_FILE")]
    pub nodes_config_file: Option<PathBuf>,

    /// `*` or a comma-separated list of allowed CORS origins.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub request_timeout: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// The per-call upstream timeout. Zero is rejected.
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        match self.request_timeout {
            0 => Err(ConfigError::InvalidTimeout),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    /// Raw node map text, from the file if one is configured.
    pub fn nodes_source(&self) -> Result<String, ConfigError> {
        match &self.nodes_config_file {
            Some(path) => std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            }),
            None => Ok(self.nodes_config.clone()),
        }
    }

    /// Builds the node registry. Any problem degrades to an empty registry.
    pub fn load_registry(&self) -> NodeRegistry {
        match self.nodes_source() {
            Ok(raw) => NodeRegistry::load(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "node configuration unavailable, starting with no nodes");
                NodeRegistry::empty()
            }
        }
    }

    pub fn cors_policy(&self) -> CorsPolicy {
        CorsPolicy::from_config(&self.allowed_origins)
    }
}
