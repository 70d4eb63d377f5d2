//! Payload server
//!
//! Clients handed this worker's port connect here, send a job as two lines and read
//! the result until the worker closes. Every served connection is followed by FREE.

use crate::jobs::JobRunner;
use crate::net::control::StatusSender;
use futures::{SinkExt, StreamExt};
use rendezvous_common::config::WorkerConfig;
use rendezvous_common::{RendezvousError, Result, METRICS};
use rendezvous_proto::MAX_LINE_LENGTH;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, info_span, warn, Instrument};

/// Worker payload server
pub struct WorkerServer {
    listener: TcpListener,
    runner: Arc<JobRunner>,
}

impl WorkerServer {
    /// Bind the payload listener. Port 0 picks a free port to advertise.
    pub async fn bind(config: &WorkerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| RendezvousError::Bind {
            addr,
            attempts: 1,
            source: e,
        })?;

        Ok(Self {
            listener,
            runner: Arc::new(JobRunner::from_config(config)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients until `shutdown` resolves
    pub async fn run_until<F>(self, status: StatusSender, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Worker listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Worker stopped accepting clients");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept client: {}", e);
                            continue;
                        }
                    };

                    let runner = Arc::clone(&self.runner);
                    let status = status.clone();
                    tokio::spawn(
                        async move {
                            let start = Instant::now();
                            match serve_client(stream, runner).await {
                                Ok(()) => {
                                    METRICS.worker.jobs_total.inc();
                                    METRICS.worker.job_duration.observe(start.elapsed().as_secs_f64());
                                    info!("Processed request in {:?}", start.elapsed());
                                }
                                Err(e) => {
                                    METRICS.worker.jobs_failed_total.inc();
                                    warn!("Failed to serve client: {}", e);
                                }
                            }

                            if let Err(e) = status.free() {
                                warn!("Could not report FREE: {}", e);
                            }
                        }
                        .instrument(info_span!("client", peer = %peer)),
                    );
                }
            }
        }
    }
}

async fn serve_client(stream: TcpStream, runner: Arc<JobRunner>) -> Result<()> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let (kind, argument) = match read_job(&mut lines).await? {
        Some(job) => job,
        None => {
            let _ = lines.send("Invalid request").await;
            return Err(RendezvousError::connection("Client closed before sending a job"));
        }
    };
    debug!("Received job {:?} {:?}", kind, argument);

    // The forwarder owns the receiver, so a failed write closes the channel and the
    // job stops at its next send instead of blocking on a full buffer.
    let (tx, mut rx) = mpsc::channel(16);
    let forward = async move {
        while let Some(line) = rx.recv().await {
            lines.send(line).await?;
        }
        Ok::<_, RendezvousError>(())
    };

    let ((), forwarded) = tokio::join!(runner.run(&kind, &argument, tx), forward);
    forwarded
}

/// Read the two job lines, or `None` if the client closed first
async fn read_job(lines: &mut Framed<TcpStream, LinesCodec>) -> Result<Option<(String, String)>> {
    let kind = match lines.next().await {
        Some(line) => line?,
        None => return Ok(None),
    };
    let argument = match lines.next().await {
        Some(line) => line?,
        None => return Ok(None),
    };
    Ok(Some((kind, argument)))
}
