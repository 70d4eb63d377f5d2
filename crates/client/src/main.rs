//! Rendezvous Client - Main Entry Point
//!
//! Runs one job through the dispatcher, either from arguments or from an
//! interactive prompt.

use anyhow::{bail, Context};
use clap::Parser;
use rendezvous_client::Client;
use rendezvous_common::{logging, RendezvousConfig};
use rendezvous_proto::{JobKind, JobRequest, StrategyTag};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Rendezvous client
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Dispatcher address (host:port)
    #[arg(long)]
    dispatcher: Option<String>,

    /// Worker pool to ask for
    #[arg(long, default_value = "static")]
    tag: StrategyTag,

    /// Job kind: 1 directory listing, 2 file transfer, 3 computation, 4 video streaming
    kind: Option<u8>,

    /// Job argument: path, seconds or frame count
    argument: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RendezvousConfig::from_env()?;
    if let Some(dispatcher) = args.dispatcher {
        config.client.dispatcher_address = dispatcher;
    }
    config.validate()?;
    logging::init("rendezvous_client", &config.observability);

    let job = match (args.kind, args.argument) {
        (Some(kind), Some(argument)) => JobRequest::new(
            JobKind::from_number(kind).with_context(|| format!("Unknown job kind {}", kind))?,
            argument,
        ),
        (None, None) => prompt().await?,
        _ => bail!("Job kind and argument must be given together"),
    };

    let client = Client::new(&config.client);
    let output = client
        .submit(args.tag, &job)
        .await
        .with_context(|| format!("{} job failed", job.kind))?;

    for line in output {
        println!("From Server: {}", line);
    }
    Ok(())
}

async fn prompt() -> anyhow::Result<JobRequest> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("Choose your request type:");
    for kind in JobKind::ALL {
        println!("{}. {}", kind.number(), kind);
    }
    let choice = stdin.next_line().await?.context("No request type given")?;
    let kind = choice
        .trim()
        .parse()
        .ok()
        .and_then(JobKind::from_number)
        .with_context(|| format!("Invalid choice {:?}", choice.trim()))?;

    println!("Enter your specific request:");
    let argument = stdin.next_line().await?.context("No request given")?;

    Ok(JobRequest::new(kind, argument.trim()))
}
