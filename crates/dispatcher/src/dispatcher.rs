//! Rendezvous accept loop
//!
//! Every accepted connection gets its own task. The first line decides what the
//! connection is: `JOIN` turns it into a worker control channel for the life of the
//! worker, `REQUEST` is answered once and closed, anything else is closed at once.

use crate::listener::{ListenerExit, StatusListener};
use crate::record::ServerRecord;
use crate::registry::Registry;
use crate::strategy::Strategies;
use futures::{SinkExt, StreamExt};
use rendezvous_common::config::DispatcherConfig;
use rendezvous_common::{RendezvousError, Result, METRICS};
use rendezvous_proto::{ControlMessage, DispatchReply, StrategyTag};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, info_span, warn, Instrument};

/// Shared by every connection task
#[derive(Clone)]
struct DispatchContext {
    registry: Arc<Registry>,
    strategies: Arc<Strategies>,
    max_line_length: usize,
}

pub struct Dispatcher {
    listener: TcpListener,
    context: DispatchContext,
}

impl Dispatcher {
    /// Bind the rendezvous port, retrying a bounded number of times.
    pub async fn bind(config: &DispatcherConfig) -> Result<Self> {
        let listener = bind_with_retry(config).await?;
        Ok(Self {
            listener,
            context: DispatchContext {
                registry: Arc::new(Registry::new()),
                strategies: Arc::new(Strategies::new()),
                max_line_length: config.max_line_length,
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.context.registry)
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// The accept socket is closed on return; connection tasks already running
    /// are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Dispatcher listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Dispatcher stopped accepting connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    debug!("Accepted connection from {}", peer);

                    let context = self.context.clone();
                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, peer, context).await {
                                if e.is_protocol() {
                                    debug!("Dropped connection: {}", e);
                                } else {
                                    warn!("Connection terminated with error: {}", e);
                                }
                            }
                        }
                        .instrument(info_span!("conn", peer = %peer)),
                    );
                }
            }
        }

        Ok(())
    }
}

async fn bind_with_retry(config: &DispatcherConfig) -> Result<TcpListener> {
    let addr = config.listen_address();
    let mut attempt = 1;

    loop {
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if attempt < config.bind_attempts => {
                warn!(
                    "Failed to bind {} (attempt {}/{}): {}; retrying in {:?}",
                    addr,
                    attempt,
                    config.bind_attempts,
                    e,
                    config.bind_retry_delay()
                );
                tokio::time::sleep(config.bind_retry_delay()).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RendezvousError::Bind {
                    addr,
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, context: DispatchContext) -> Result<()> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(context.max_line_length));

    let first = match lines.next().await {
        Some(line) => line?,
        None => {
            debug!("Connection closed before sending anything");
            return Ok(());
        }
    };

    match first.parse::<ControlMessage>() {
        Ok(ControlMessage::Join { port, tag }) => register(lines, peer, port, tag, context).await,
        Ok(ControlMessage::Request { tag }) => dispatch(lines, tag, context).await,
        Ok(other) => {
            debug!("Closing connection opened with {:?}", other);
            Ok(())
        }
        Err(e) => {
            if first.split_whitespace().next() == Some("JOIN") {
                METRICS.dispatcher.joins_rejected_total.inc();
                info!("Rejected registration {:?}: {}", first, e);
            }
            Err(e.into())
        }
    }
}

/// Register a worker and serve its control connection until it goes away
async fn register(
    mut lines: Framed<TcpStream, LinesCodec>,
    peer: SocketAddr,
    port: u16,
    tag: StrategyTag,
    context: DispatchContext,
) -> Result<()> {
    let record = ServerRecord::new(SocketAddr::new(peer.ip(), port), tag, peer);
    let endpoint = record.endpoint();
    // Added before OK so the worker is selectable as soon as it reads the reply. A
    // REQUEST landing between the add and a failed OK write can still be handed this
    // endpoint; the record is rolled back below and that client's connect fails.
    let id = context.registry.add(record);

    if let Err(e) = lines.send(DispatchReply::Ok.to_string()).await {
        context.registry.remove(id);
        return Err(e.into());
    }

    METRICS.dispatcher.joins_total.inc();
    METRICS
        .dispatcher
        .registered_workers
        .set(context.registry.len() as i64);
    info!("Registered {} worker at {} as {}", tag, endpoint, id);

    let listener = StatusListener::new(id, endpoint, Arc::clone(&context.registry), lines);
    match listener
        .run()
        .instrument(info_span!("worker", %id, %endpoint))
        .await
    {
        ListenerExit::Failed(e) => Err(e),
        ListenerExit::Goodbye | ListenerExit::Closed => Ok(()),
    }
}

/// Answer a single client request and close
async fn dispatch(
    mut lines: Framed<TcpStream, LinesCodec>,
    tag: StrategyTag,
    context: DispatchContext,
) -> Result<()> {
    METRICS.dispatcher.requests_total.inc();

    let selected = context.registry.select(context.strategies.for_tag(tag));
    let reply = match &selected {
        Some(record) => {
            METRICS.dispatcher.requests_dispatched_total.inc();
            info!("Dispatching {} request to {}", tag, record.endpoint());
            DispatchReply::Port(record.endpoint().port())
        }
        None => {
            METRICS.dispatcher.no_server_total.inc();
            info!("No idle {} worker for request", tag);
            DispatchReply::NoServer
        }
    };

    if let Err(e) = lines.send(reply.to_string()).await {
        // The client never learned the port, so the worker will never report FREE for it.
        if let Some(record) = selected {
            context.registry.mark_free(record.id());
        }
        return Err(e.into());
    }

    Ok(())
}
