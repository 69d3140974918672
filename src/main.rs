//! Reverse proxy that fronts a fleet of traffic-monitoring agents.
//!
//! Browsers talk to one JSON API; each request is forwarded to the agent
//! named in the path with that agent's bearer credential attached, and the
//! agent's answer comes back wrapped in a uniform envelope.

mod config;
mod error;
mod health;
mod proxy;
mod server;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use proxy::{AllowedOrigins, Forwarder, Gateway};

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(&config.log_level);

    let timeout = config.request_timeout()?;
    let registry = Arc::new(config.load_registry());
    let cors = config.cors_policy();

    let forwarder = Forwarder::new(Arc::clone(&registry), timeout)
        .context("failed to build upstream HTTP client")?;

    let cors_mode = match cors.origins() {
        AllowedOrigins::Any => "any".to_string(),
        AllowedOrigins::List(origins) => origins.join(","),
    };
    tracing::info!(
        nodes = registry.len(),
        timeout_secs = forwarder.timeout().as_secs(),
        cors = %cors_mode,
        "node-gateway starting"
    );
    // Credentials stay out of the log.
    for node in registry.list() {
        tracing::info!(node_id = %node.id, name = %node.display_name, url = %node.base_url, "registered node");
    }

    let gateway = Arc::new(Gateway::new(forwarder, cors));

    if let Some(addr) = config.health_listen {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = health::start_health_server(addr, registry).await {
                tracing::error!(error = %e, "probe server stopped");
            }
        });
    }

    tokio::select! {
        result = server::start_gateway_server(config.listen, gateway) => {
            result.with_context(|| format!("gateway server on {} failed", config.listen))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
