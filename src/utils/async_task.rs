use std::future::pending;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Spawns a named background task and logs its error instead of returning it
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => debug!("spawned task: {name} stopped"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    })
}

/// Resolves when the shutdown signal fires or its sender is dropped.
///
/// Without a signal the task is process-lifetime and this never resolves.
pub(crate) async fn wait_for_shutdown(shutdown_signal: &mut Option<watch::Receiver<()>>) {
    match shutdown_signal {
        Some(rx) => {
            let _ = rx.changed().await;
        }
        None => pending::<()>().await,
    }
}
