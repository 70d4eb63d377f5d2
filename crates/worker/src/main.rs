//! Rendezvous Worker - Main Entry Point
//!
//! Binds the payload port, registers with the dispatcher and serves clients until
//! interrupted, then leaves the pool with GOODBYE.

use clap::Parser;
use rendezvous_common::{logging, RendezvousConfig, Result};
use rendezvous_proto::StrategyTag;
use rendezvous_worker::{ControlChannel, WorkerServer};
use tokio::signal;
use tracing::{error, info};

/// Rendezvous worker
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Payload port to listen on and advertise (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Strategy pool to join
    #[arg(long)]
    tag: Option<StrategyTag>,

    /// Dispatcher address (host:port)
    #[arg(long)]
    dispatcher: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = RendezvousConfig::from_env()?;
    if let Some(port) = args.port {
        config.worker.port = port;
    }
    if let Some(tag) = args.tag {
        config.worker.tag = tag;
    }
    if let Some(dispatcher) = args.dispatcher {
        config.worker.dispatcher_address = dispatcher;
    }
    config.validate()?;

    logging::init("rendezvous_worker", &config.observability);
    info!("Starting Rendezvous Worker");

    let worker_config = &config.worker;
    let server = WorkerServer::bind(worker_config).await?;
    let port = server.local_addr()?.port();

    let control =
        ControlChannel::register(&worker_config.dispatcher_address, port, worker_config.tag).await?;

    server
        .run_until(control.sender(), async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await?;

    control.goodbye().await?;
    info!("Rendezvous Worker shutdown complete");
    Ok(())
}
