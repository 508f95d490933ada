use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use shardkit::Authenticator;
use shardkit::ConnectionOrigin;
use shardkit::CommandBody;
use shardkit::CommandRequest;
use shardkit::CommandResponse;
use shardkit::CommandTarget;
use shardkit::Dispatcher;
use shardkit::Error;
use shardkit::FileDumper;
use shardkit::FieldValue;
use shardkit::IndexPropagationChecker;
use shardkit::Result;
use shardkit::Settings;
use shardkit::TopologyManager;
use shardkit::{doc, DumpTool};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    let _guard = init_observability(Path::new("logs"))?;

    // Initializing Shutdown Signal
    let (graceful_tx, mut graceful_rx) = watch::channel(());

    if settings.monitoring.enable_metrics_server {
        let port = settings.monitoring.prometheus_port;
        let shutdown = graceful_rx.clone();
        tokio::spawn(async move {
            shardkit::serve_metrics(port, shutdown).await;
        });
    }

    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    // Build the cluster
    let manager = TopologyManager::new(settings.clone());
    let topology = Arc::new(manager.build_cluster().await?);
    let auth = Arc::new(Authenticator::new(&settings.security));
    let dispatcher = Dispatcher::new(topology.clone(), auth);

    if let Err(e) = smoke_scenario(&dispatcher, &settings).await {
        error!("smoke scenario failed: {:?}", e);
    }

    info!("Harness running. Waiting for CTRL+C signal...");
    let _ = graceful_rx.changed().await;

    topology.stop().await;
    println!("Exiting program.");
    Ok(())
}

/// Drives one end-to-end pass over the command surface: enable sharding,
/// shard a collection, distribute chunks, count through the router and dump
/// the primary shard.
async fn smoke_scenario(
    dispatcher: &Dispatcher,
    settings: &Settings,
) -> Result<()> {
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());

    dispatch(dispatcher, &connection, CommandBody::EnableSharding { db: "demo".into() }).await?;
    dispatch(
        dispatcher,
        &connection,
        CommandBody::ShardCollection {
            namespace: "demo.events".into(),
            key: "num".into(),
            unique: false,
        },
    )
    .await?;

    for num in 1..=8i64 {
        dispatch(
            dispatcher,
            &connection,
            CommandBody::Insert {
                namespace: "demo.events".into(),
                documents: vec![doc([("num", num)])],
                write_concern: None,
            },
        )
        .await?;
    }

    dispatch(
        dispatcher,
        &connection,
        CommandBody::Split {
            namespace: "demo.events".into(),
            middle: FieldValue::Int(5),
        },
    )
    .await?;

    let destination = dispatcher.topology().pick_other_shard("shard0")?.name.clone();
    dispatch(
        dispatcher,
        &connection,
        CommandBody::MoveChunk {
            namespace: "demo.events".into(),
            find: FieldValue::Int(5),
            to: destination,
        },
    )
    .await?;

    let count = dispatch(
        dispatcher,
        &connection,
        CommandBody::Count {
            namespace: "demo.events".into(),
        },
    )
    .await?;
    info!("router counts {:?} document(s) in demo.events", count.count());

    let checker = IndexPropagationChecker::new(settings.retry.propagation);
    checker.await_index_convergence(dispatcher.topology(), "demo.events").await?;

    let dump_dir = std::env::temp_dir().join("shardkit-dump");
    let report = FileDumper.dump(
        dispatcher.topology().shard("shard0")?.store(),
        "demo",
        &dump_dir,
    )?;
    info!("dumped {} file(s) to {:?}", report.files.len(), dump_dir);

    dispatcher.disconnect(&connection);
    Ok(())
}

async fn dispatch(
    dispatcher: &Dispatcher,
    connection: &str,
    body: CommandBody,
) -> Result<CommandResponse> {
    let name = body.name().to_string();
    let response = dispatcher
        .run(connection, CommandRequest::new(body, CommandTarget::Router(0)))
        .await?;
    if !response.ok {
        return Err(Error::Fatal(format!(
            "{} rejected: {}",
            name,
            response.errmsg.clone().unwrap_or_default()
        )));
    }
    Ok(response)
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    info!("Shutdown server..");
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    // Cancel every registered node first, so nodes whose owner never calls
    // stop still wind down with the process.
    shardkit::cancel_all_registered();

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("harness.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
