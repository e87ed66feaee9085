//! relayd - Agent relay daemon
//!
//! Serves one public endpoint (`/copilotkit`) and forwards every request to
//! the agent backend it names, relaying single responses and streams back.
//!
//! Usage:
//!   relayd [--config relayd.toml] [--port 4000] [--host 0.0.0.0] [--json-logs]
//!
//! Without a config file a single `sample_agent` is served from `AGENT_URL`
//! (default `http://localhost:8000`).

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relay_api::{create_router, AppState};
use relay_gateway::{AgentRegistry, Gateway};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str = "relayd=info,relay_api=info,relay_gateway=info,tower_http=info";

#[derive(Parser)]
#[command(name = "relayd")]
#[command(author, version, about = "Agent relay daemon")]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    tracing::info!("Starting relayd (agent relay)");

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            Config::load_from(path)?
        }
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    // A bad registry is fatal before anything is bound
    let registry =
        AgentRegistry::build(config.registry_entries()?).context("Invalid agent registry")?;
    for agent in registry.agents() {
        tracing::info!(agent = %agent.id(), target = %agent.endpoint(), "Agent available");
    }

    let router_config = config
        .router_config()
        .context("Invalid CORS configuration")?;
    let gateway = Gateway::new(Arc::new(registry), config.gateway_config())
        .context("Failed to create backend HTTP client")?;
    let app = create_router(AppState::new(gateway), &router_config);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let origins: Vec<&str> = router_config.access.origins().collect();
    tracing::info!(
        addr = %listener.local_addr()?,
        ?origins,
        "Agent relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("relayd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, draining connections");
}
