//! Rendezvous Client
//!
//! Asks the dispatcher for a worker of a given pool, then runs a job directly
//! against the worker it was handed.

use futures::{SinkExt, StreamExt};
use rendezvous_common::config::ClientConfig;
use rendezvous_common::{RendezvousError, Result};
use rendezvous_proto::{ControlMessage, DispatchReply, JobRequest, StrategyTag, MAX_LINE_LENGTH};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info};

/// Client for one dispatcher
#[derive(Debug, Clone)]
pub struct Client {
    dispatcher: String,
    request_attempts: u32,
    retry_delay: Duration,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            dispatcher: config.dispatcher_address.clone(),
            request_attempts: config.request_attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    /// Send a single `REQUEST <tag>`. `None` means NO_SERVER.
    pub async fn request_worker(&self, tag: StrategyTag) -> Result<Option<SocketAddr>> {
        let stream = TcpStream::connect(&self.dispatcher).await.map_err(|e| {
            RendezvousError::connection(format!("Failed to connect to dispatcher {}: {}", self.dispatcher, e))
        })?;
        let host = stream.peer_addr()?.ip();
        let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        lines.send(ControlMessage::Request { tag }.to_string()).await?;
        let reply = match lines.next().await {
            Some(line) => line?,
            None => {
                return Err(RendezvousError::connection(
                    "Dispatcher closed the connection without a reply",
                ))
            }
        };

        match reply.parse::<DispatchReply>()? {
            DispatchReply::Port(port) => Ok(Some(SocketAddr::new(host, port))),
            DispatchReply::NoServer => Ok(None),
            DispatchReply::Ok => Err(RendezvousError::connection("Unexpected OK for a request")),
        }
    }

    /// Request a worker, retrying NO_SERVER up to the configured number of attempts
    pub async fn acquire_worker(&self, tag: StrategyTag) -> Result<SocketAddr> {
        for attempt in 1..=self.request_attempts {
            if let Some(worker) = self.request_worker(tag).await? {
                debug!("Dispatcher assigned worker {}", worker);
                return Ok(worker);
            }
            if attempt < self.request_attempts {
                info!(
                    "No {} worker available (attempt {}/{}), retrying in {:?}",
                    tag, attempt, self.request_attempts, self.retry_delay
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(RendezvousError::NoServer)
    }

    /// Acquire a worker and run `job` on it
    pub async fn submit(&self, tag: StrategyTag, job: &JobRequest) -> Result<Vec<String>> {
        let worker = self.acquire_worker(tag).await?;
        run_job(worker, job).await
    }
}

/// Send `job` to `worker` and collect its output until the worker closes
pub async fn run_job(worker: SocketAddr, job: &JobRequest) -> Result<Vec<String>> {
    let stream = TcpStream::connect(worker).await.map_err(|e| {
        RendezvousError::connection(format!("Failed to connect to worker {}: {}", worker, e))
    })?;
    // Job output lines (file contents) may be longer than protocol lines.
    let mut lines = Framed::new(stream, LinesCodec::new());

    for line in job.lines() {
        lines.send(line).await?;
    }

    let mut output = Vec::new();
    while let Some(line) = lines.next().await {
        output.push(line?);
    }
    Ok(output)
}
