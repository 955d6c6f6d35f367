use std::path::Path;
use std::sync::Arc;

use doc_mirror::ChangeStreamSource;
use doc_mirror::Collection;
use doc_mirror::Document;
use doc_mirror::Error;
use doc_mirror::MapEvent;
use doc_mirror::MemCollection;
use doc_mirror::Result;
use doc_mirror::RuntimeBuilder;
use doc_mirror::Settings;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, PartialEq)]
struct Member {
    id: String,
    name: String,
    vouches: u32,
}

impl Document for Member {
    fn id(&self) -> &str {
        &self.id
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.log_dir)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let runtime = RuntimeBuilder::new(settings.clone(), graceful_rx)
        .start_metrics_server()
        .build();

    let members = Arc::new(MemCollection::with_documents(
        "members",
        settings.cache.feed_buffer_size,
        [
            Member {
                id: "1".into(),
                name: "ada".into(),
                vouches: 3,
            },
            Member {
                id: "2".into(),
                name: "grace".into(),
                vouches: 5,
            },
        ],
    ));

    let collection: Arc<dyn Collection<Member>> = members.clone();
    let feed: Arc<dyn ChangeStreamSource<Member>> = members;
    let cache = runtime.bind(collection, Some(feed))?;
    cache.on(MapEvent::Add, |member: &Member| {
        info!(id = %member.id, name = %member.name, vouches = member.vouches, "member cached");
    });

    runtime.start().await?;
    info!(
        members = cache.len(),
        "Application started. Waiting for CTRL+C signal..."
    );

    graceful_shutdown(graceful_tx).await?;

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("cannot install SIGINT handler: {}", e)))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("cannot install SIGTERM handler: {}", e)))?;
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

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::SignalSenderClosed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("doc-mirror")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| Error::Fatal(format!("cannot open log file in {}: {}", log_dir.display(), e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
