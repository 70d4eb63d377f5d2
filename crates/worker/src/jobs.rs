//! Job handlers
//!
//! Each job streams its output as lines into a channel; the connection handler
//! forwards them to the client. A closed channel means the client went away and
//! the job stops early.

use rendezvous_common::config::WorkerConfig;
use rendezvous_proto::JobKind;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Executes jobs with the configured pacing
#[derive(Debug, Clone)]
pub struct JobRunner {
    compute_unit: Duration,
    frame_interval: Duration,
}

/// Output stops when the receiving side is gone
type Output = mpsc::Sender<String>;

impl JobRunner {
    pub fn new(compute_unit: Duration, frame_interval: Duration) -> Self {
        Self {
            compute_unit,
            frame_interval,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.compute_unit(), config.frame_interval())
    }

    /// Run the job described by the two request lines
    pub async fn run(&self, kind_line: &str, argument: &str, out: Output) {
        let kind = match JobKind::parse_line(kind_line) {
            Ok(Some(kind)) => kind,
            Ok(None) => {
                let _ = out.send("Invalid choice".to_string()).await;
                return;
            }
            Err(e) => {
                let _ = out.send(error_line(e)).await;
                return;
            }
        };

        debug!("Running {} job with argument {:?}", kind, argument);
        match kind {
            JobKind::ListDirectory => list_directory(argument, &out).await,
            JobKind::ReadFile => read_file(argument, &out).await,
            JobKind::Compute => self.compute(argument, &out).await,
            JobKind::Stream => self.stream(argument, &out).await,
        }
    }

    async fn compute(&self, argument: &str, out: &Output) {
        let units = match parse_count(argument) {
            Ok(units) => units,
            Err(line) => {
                let _ = out.send(line).await;
                return;
            }
        };

        tokio::time::sleep(self.compute_unit * units).await;
        let _ = out.send("Computation done".to_string()).await;
    }

    async fn stream(&self, argument: &str, out: &Output) {
        let frames = match parse_count(argument) {
            Ok(frames) => frames,
            Err(line) => {
                let _ = out.send(line).await;
                return;
            }
        };

        for frame in 0..frames {
            if frame > 0 {
                tokio::time::sleep(self.frame_interval).await;
            }
            if out.send(format!("Video frame {}", frame)).await.is_err() {
                debug!("Client left after {} frames", frame);
                return;
            }
        }
    }
}

async fn list_directory(argument: &str, out: &Output) {
    let path = Path::new(argument);
    if !tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        let _ = out.send("Invalid directory".to_string()).await;
        return;
    }

    let mut names = Vec::new();
    let listing = async {
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok::<_, std::io::Error>(())
    };
    if let Err(e) = listing.await {
        let _ = out.send(error_line(e)).await;
        return;
    }

    names.sort();
    for name in names {
        if out.send(name).await.is_err() {
            return;
        }
    }
}

async fn read_file(argument: &str, out: &Output) {
    let path = Path::new(argument);
    if !tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false) {
        let _ = out.send("File not found".to_string()).await;
        return;
    }

    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            for line in content.lines() {
                if out.send(line.to_string()).await.is_err() {
                    return;
                }
            }
        }
        Err(e) => {
            let _ = out.send(error_line(e)).await;
        }
    }
}

fn parse_count(argument: &str) -> Result<u32, String> {
    argument
        .trim()
        .parse()
        .map_err(|_| error_line(format!("expected a non-negative number, got {:?}", argument)))
}

fn error_line(reason: impl std::fmt::Display) -> String {
    format!("Error processing request: {}", reason)
}
