//! # Emote-Stream Node
//!
//! Entry point: logging, configuration, startup, then wait for SIGINT/SIGTERM
//! or a fatal task failure and shut down in order.

use anyhow::{Context, Result};
use node_runtime::{EmoteStreamNode, LoggingConfig, NodeConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .context("failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .context("failed to initialise logging")?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LoggingConfig::from_env())?;

    info!("===========================================");
    info!("  Emote-Stream Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let config = NodeConfig::from_env();
    let node = EmoteStreamNode::new(config).context("invalid configuration")?;
    let mut running = node.start().await.context("failed to start node")?;

    let failure = tokio::select! {
        _ = shutdown_signal() => None,
        fatal = running.fatal() => fatal,
    };

    running.shutdown().await;

    match failure {
        Some(e) => {
            error!(error = %e, "Node stopped after a fatal failure");
            Err(e.into())
        }
        None => Ok(()),
    }
}
