//! Worker side of the dispatcher control connection

use futures::{SinkExt, StreamExt};
use rendezvous_common::{RendezvousError, Result};
use rendezvous_proto::{ControlMessage, DispatchReply, StrategyTag, MAX_LINE_LENGTH};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// Cheap handle for reporting FREE from connection tasks
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl StatusSender {
    /// Report that the outstanding request is done
    pub fn free(&self) -> Result<()> {
        self.tx
            .send(ControlMessage::Free)
            .map_err(|_| RendezvousError::connection("Control channel closed"))
    }
}

/// Registered control connection to the dispatcher
pub struct ControlChannel {
    sender: StatusSender,
    writer: JoinHandle<()>,
}

impl ControlChannel {
    /// Connect to the dispatcher and JOIN the `tag` pool with the payload `port`
    pub async fn register(dispatcher: &str, port: u16, tag: StrategyTag) -> Result<Self> {
        let stream = TcpStream::connect(dispatcher).await.map_err(|e| {
            RendezvousError::connection(format!("Failed to connect to dispatcher {}: {}", dispatcher, e))
        })?;
        let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        lines.send(ControlMessage::Join { port, tag }.to_string()).await?;

        let reply = match lines.next().await {
            Some(line) => line?,
            None => {
                return Err(RendezvousError::connection(
                    "Dispatcher rejected the registration",
                ))
            }
        };
        match reply.parse::<DispatchReply>()? {
            DispatchReply::Ok => {}
            other => {
                return Err(RendezvousError::connection(format!(
                    "Unexpected registration reply: {}",
                    other
                )))
            }
        }

        info!("Registered with dispatcher {} as {} worker on port {}", dispatcher, tag, port);

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_status(lines, rx));

        Ok(Self {
            sender: StatusSender { tx },
            writer,
        })
    }

    pub fn sender(&self) -> StatusSender {
        self.sender.clone()
    }

    /// Leave the pool and close the control connection
    pub async fn goodbye(self) -> Result<()> {
        let _ = self.sender.tx.send(ControlMessage::Goodbye);
        drop(self.sender);
        self.writer
            .await
            .map_err(|e| RendezvousError::internal(format!("Control writer task failed: {}", e)))
    }
}

/// Single writer for the control connection; ends after GOODBYE
async fn write_status(
    mut lines: Framed<TcpStream, LinesCodec>,
    mut rx: mpsc::UnboundedReceiver<ControlMessage>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = lines.send(message.to_string()).await {
            warn!("Failed to send {} to dispatcher: {}", message, e);
            return;
        }
        debug!("Sent {} to dispatcher", message);

        if message == ControlMessage::Goodbye {
            break;
        }
    }
    let _ = SinkExt::<String>::close(&mut lines).await;
}
