//! Rendezvous Dispatcher - Main Entry Point
//!
//! Binds the rendezvous port and dispatches until interrupted.

use clap::Parser;
use rendezvous_common::{logging, RendezvousConfig, Result, METRICS};
use rendezvous_dispatcher::Dispatcher;
use tokio::signal;
use tracing::{debug, error, info};

/// Rendezvous dispatcher for worker pools
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Port to listen on (overrides the configuration file)
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = RendezvousConfig::from_env()?;
    if let Some(port) = args.port {
        config.dispatcher.port = port;
    }
    config.validate()?;

    logging::init("rendezvous_dispatcher", &config.observability);
    info!("Starting Rendezvous Dispatcher on {}", config.dispatcher.listen_address());

    let dispatcher = Dispatcher::bind(&config.dispatcher).await.map_err(|e| {
        error!("{}", e);
        e
    })?;

    dispatcher
        .run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await?;

    if config.observability.enable_metrics {
        debug!("Final metrics:\n{}", METRICS.gather());
    }

    info!("Rendezvous Dispatcher shutdown complete");
    Ok(())
}
