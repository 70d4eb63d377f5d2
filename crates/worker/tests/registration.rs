use futures::{SinkExt, StreamExt};
use rendezvous_common::config::{DispatcherConfig, WorkerConfig};
use rendezvous_dispatcher::{Dispatcher, Registry};
use rendezvous_proto::StrategyTag;
use rendezvous_worker::{ControlChannel, WorkerServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

async fn start_dispatcher() -> (SocketAddr, Arc<Registry>) {
    let config = DispatcherConfig {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    let dispatcher = Dispatcher::bind(&config).await.unwrap();
    let addr = dispatcher.local_addr().unwrap();
    let registry = dispatcher.registry();
    tokio::spawn(dispatcher.run());
    (addr, registry)
}

fn worker_config(dispatcher: SocketAddr, tag: StrategyTag) -> WorkerConfig {
    WorkerConfig {
        dispatcher_address: dispatcher.to_string(),
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        tag,
        compute_unit_ms: 1,
        frame_interval_ms: 1,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

async fn ask(dispatcher: SocketAddr, tag: StrategyTag) -> String {
    let mut lines = Framed::new(TcpStream::connect(dispatcher).await.unwrap(), LinesCodec::new());
    lines.send(format!("REQUEST {}", tag)).await.unwrap();
    lines.next().await.unwrap().unwrap()
}

struct RunningWorker {
    port: u16,
    control: ControlChannel,
    stop: oneshot::Sender<()>,
    serving: JoinHandle<rendezvous_common::Result<()>>,
}

async fn start_worker(dispatcher: SocketAddr, tag: StrategyTag) -> RunningWorker {
    let config = worker_config(dispatcher, tag);
    let server = WorkerServer::bind(&config).await.unwrap();
    let port = server.local_addr().unwrap().port();
    let control = ControlChannel::register(&config.dispatcher_address, port, config.tag)
        .await
        .unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.run_until(control.sender(), async {
        let _ = stopped.await;
    }));
    RunningWorker {
        port,
        control,
        stop,
        serving,
    }
}

#[tokio::test]
async fn test_worker_serves_job_and_reports_free() {
    let (dispatcher, registry) = start_dispatcher().await;
    let config = worker_config(dispatcher, StrategyTag::Dynamic);

    let server = WorkerServer::bind(&config).await.unwrap();
    let port = server.local_addr().unwrap().port();
    let control = ControlChannel::register(&config.dispatcher_address, port, config.tag)
        .await
        .unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.run_until(control.sender(), async {
        let _ = stopped.await;
    }));

    assert_eq!(registry.len(), 1);
    assert_eq!(ask(dispatcher, StrategyTag::Dynamic).await, port.to_string());
    assert_eq!(ask(dispatcher, StrategyTag::Dynamic).await, "NO_SERVER");

    let mut job = Framed::new(
        TcpStream::connect(("127.0.0.1", port)).await.unwrap(),
        LinesCodec::new(),
    );
    job.send("4").await.unwrap();
    job.send("2").await.unwrap();
    let mut output = Vec::new();
    while let Some(line) = job.next().await {
        output.push(line.unwrap());
    }
    assert_eq!(output, vec!["Video frame 0", "Video frame 1"]);

    eventually(|| registry.snapshot().iter().all(|r| !r.busy)).await;
    assert_eq!(ask(dispatcher, StrategyTag::Dynamic).await, port.to_string());

    stop.send(()).unwrap();
    serving.await.unwrap().unwrap();
    control.goodbye().await.unwrap();

    eventually(|| registry.is_empty()).await;
    assert_eq!(ask(dispatcher, StrategyTag::Dynamic).await, "NO_SERVER");
}

#[tokio::test]
async fn test_registration_fails_without_dispatcher() {
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = unused.local_addr().unwrap();
    drop(unused);

    let result = ControlChannel::register(&addr.to_string(), 7000, StrategyTag::Static).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_client_leaving_mid_stream_frees_worker() {
    let (dispatcher, registry) = start_dispatcher().await;
    let worker = start_worker(dispatcher, StrategyTag::Static).await;

    assert_eq!(ask(dispatcher, StrategyTag::Static).await, worker.port.to_string());
    assert!(registry.snapshot()[0].busy);

    let mut job = Framed::new(
        TcpStream::connect(("127.0.0.1", worker.port)).await.unwrap(),
        LinesCodec::new(),
    );
    job.send("4").await.unwrap();
    job.send("100000").await.unwrap();
    assert_eq!(job.next().await.unwrap().unwrap(), "Video frame 0");
    drop(job);

    // The stream would take minutes to finish; FREE has to follow the disconnect.
    eventually(|| registry.snapshot().iter().all(|r| !r.busy)).await;
    assert_eq!(ask(dispatcher, StrategyTag::Static).await, worker.port.to_string());

    worker.stop.send(()).unwrap();
    worker.serving.await.unwrap().unwrap();
    worker.control.goodbye().await.unwrap();
}

#[tokio::test]
async fn test_incomplete_job_gets_invalid_request() {
    let (dispatcher, registry) = start_dispatcher().await;
    let worker = start_worker(dispatcher, StrategyTag::Dynamic).await;

    assert_eq!(ask(dispatcher, StrategyTag::Dynamic).await, worker.port.to_string());

    let mut stream = TcpStream::connect(("127.0.0.1", worker.port)).await.unwrap();
    stream.write_all(b"4\n").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    assert_eq!(reply, "Invalid request\n");

    eventually(|| registry.snapshot().iter().all(|r| !r.busy)).await;

    worker.stop.send(()).unwrap();
    worker.serving.await.unwrap().unwrap();
    worker.control.goodbye().await.unwrap();
}
