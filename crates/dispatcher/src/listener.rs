//! Per-worker status listener
//!
//! Owns a worker's control connection after the JOIN handshake and applies the
//! FREE / GOODBYE tokens it sends. Losing the connection deregisters the worker;
//! there is no reconnection, the worker has to JOIN again.

use crate::record::RecordId;
use crate::registry::Registry;
use futures::StreamExt;
use rendezvous_common::{RendezvousError, METRICS};
use rendezvous_proto::ControlMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Why a listener stopped
#[derive(Debug)]
pub enum ListenerExit {
    /// Worker sent GOODBYE
    Goodbye,

    /// Control connection closed without GOODBYE
    Closed,

    /// Control connection failed
    Failed(RendezvousError),
}

pub struct StatusListener<S> {
    id: RecordId,
    endpoint: SocketAddr,
    registry: Arc<Registry>,
    lines: Framed<S, LinesCodec>,
}

impl<S> StatusListener<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        id: RecordId,
        endpoint: SocketAddr,
        registry: Arc<Registry>,
        lines: Framed<S, LinesCodec>,
    ) -> Self {
        Self {
            id,
            endpoint,
            registry,
            lines,
        }
    }

    /// Consume status tokens until GOODBYE or connection loss.
    ///
    /// The record is out of the registry by the time this returns, and the
    /// connection is closed when the listener is dropped.
    pub async fn run(mut self) -> ListenerExit {
        loop {
            let line = match self.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.deregister();
                    METRICS.dispatcher.connections_lost_total.inc();
                    let error = RendezvousError::from(e);
                    warn!(
                        "Lost control connection to {} ({}): {}; removed from pool",
                        self.endpoint, self.id, error
                    );
                    return ListenerExit::Failed(error);
                }
                None => {
                    self.deregister();
                    METRICS.dispatcher.connections_lost_total.inc();
                    warn!(
                        "Control connection to {} ({}) closed without GOODBYE; removed from pool",
                        self.endpoint, self.id
                    );
                    return ListenerExit::Closed;
                }
            };

            match line.parse::<ControlMessage>() {
                Ok(ControlMessage::Free) => {
                    if self.registry.mark_free(self.id) {
                        debug!("Worker {} is free", self.endpoint);
                    }
                }
                Ok(ControlMessage::Goodbye) => {
                    self.deregister();
                    METRICS.dispatcher.goodbyes_total.inc();
                    info!("Worker {} ({}) deregistered", self.endpoint, self.id);
                    return ListenerExit::Goodbye;
                }
                Ok(other) => {
                    debug!("Ignoring {:?} on control connection of {}", other, self.endpoint);
                }
                Err(e) => {
                    debug!("Ignoring malformed status line from {}: {}", self.endpoint, e);
                }
            }
        }
    }

    fn deregister(&self) {
        self.registry.remove(self.id);
        METRICS
            .dispatcher
            .registered_workers
            .set(self.registry.len() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ServerRecord;
    use futures::SinkExt;
    use rendezvous_proto::StrategyTag;
    use tokio::io::DuplexStream;

    fn setup() -> (Arc<Registry>, RecordId, StatusListener<DuplexStream>, Framed<DuplexStream, LinesCodec>) {
        let registry = Arc::new(Registry::new());
        let record = ServerRecord::new(
            SocketAddr::from(([127, 0, 0, 1], 7000)),
            StrategyTag::Dynamic,
            SocketAddr::from(([127, 0, 0, 1], 50000)),
        );
        let endpoint = record.endpoint();
        let id = registry.add(record);

        let (dispatcher_side, worker_side) = tokio::io::duplex(1024);
        let listener = StatusListener::new(
            id,
            endpoint,
            Arc::clone(&registry),
            Framed::new(dispatcher_side, LinesCodec::new()),
        );
        (registry, id, listener, Framed::new(worker_side, LinesCodec::new()))
    }

    #[tokio::test]
    async fn test_free_then_goodbye() {
        let (registry, id, listener, mut worker) = setup();
        registry.update(id, |r| {
            r.busy = true;
            r.active_connections = 1;
        });

        let task = tokio::spawn(listener.run());
        worker.send("FREE").await.unwrap();
        worker.send("GOODBYE").await.unwrap();

        assert!(matches!(task.await.unwrap(), ListenerExit::Goodbye));
        assert!(registry.is_empty());
        assert!(worker.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tokens_are_ignored_until_close() {
        let (registry, id, listener, mut worker) = setup();
        registry.update(id, |r| {
            r.busy = true;
            r.active_connections = 1;
        });

        let task = tokio::spawn(listener.run());
        worker.send("FREE").await.unwrap();
        worker.send("NOT_A_STATUS").await.unwrap();
        drop(worker);

        assert!(matches!(task.await.unwrap(), ListenerExit::Closed));
        assert!(registry.get(id).is_none());
    }

    #[tokio::test]
    async fn test_free_is_applied_before_next_token() {
        let (registry, id, listener, mut worker) = setup();
        registry.update(id, |r| {
            r.busy = true;
            r.active_connections = 1;
        });

        let task = tokio::spawn(listener.run());
        worker.send("FREE").await.unwrap();

        let mut freed = false;
        for _ in 0..100 {
            if registry.get(id).map(|r| !r.busy && r.active_connections == 0) == Some(true) {
                freed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(freed);

        worker.send("GOODBYE").await.unwrap();
        assert!(matches!(task.await.unwrap(), ListenerExit::Goodbye));
    }

    #[tokio::test]
    async fn test_connection_loss_deregisters() {
        let (registry, _id, listener, worker) = setup();

        drop(worker);

        assert!(matches!(listener.run().await, ListenerExit::Closed));
        assert!(registry.is_empty());
    }
}
