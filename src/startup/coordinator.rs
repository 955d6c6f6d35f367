//! Process-wide startup task list.
//!
//! Tasks are collected while the process is being assembled and run exactly
//! once, all in parallel, before the process reports ready. Registering
//! after `run_all` has been invoked is a programming error.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;

use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::Error;
use crate::Result;
use crate::StartupError;

type StartupTask = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Read-back slot for a startup task's result
pub struct StartupHandle<R> {
    name: String,
    value: Arc<OnceLock<R>>,
}

impl<R> Clone for StartupHandle<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for StartupHandle<R> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StartupHandle")
            .field("name", &self.name)
            .field("value", &self.value.get())
            .finish()
    }
}

impl<R> StartupHandle<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` until the task has completed successfully
    pub fn value(&self) -> Option<&R> {
        self.value.get()
    }
}

#[derive(Default)]
struct CoordinatorState {
    pending: Vec<(String, StartupTask)>,
    closed: bool,
}

#[derive(Default)]
pub struct StartupCoordinator {
    state: Mutex<CoordinatorState>,
}

impl fmt::Debug for StartupCoordinator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StartupCoordinator")
            .field("pending", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl StartupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `task` to the pending list.
    ///
    /// # Panics
    /// Panics if `run_all` has already been invoked.
    pub fn add_startup_task<F, Fut, R>(
        &self,
        name: impl Into<String>,
        task: F,
    ) -> StartupHandle<R>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + Sync + 'static,
    {
        let name = name.into();
        match self.try_add_startup_task(name.clone(), task) {
            Ok(handle) => handle,
            Err(e) => panic!("cannot register startup task {name}: {e}"),
        }
    }

    /// Like [`add_startup_task`](Self::add_startup_task), returning
    /// [`StartupError::AlreadyRun`] instead of panicking.
    pub fn try_add_startup_task<F, Fut, R>(
        &self,
        name: impl Into<String>,
        task: F,
    ) -> Result<StartupHandle<R>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StartupError::AlreadyRun.into());
        }

        let handle = StartupHandle {
            name: name.into(),
            value: Arc::new(OnceLock::new()),
        };
        let slot = handle.value.clone();
        let boxed: StartupTask = Box::new(move || {
            async move {
                let value = task().await?;
                let _ = slot.set(value);
                Ok(())
            }
            .boxed()
        });

        debug!(task = %handle.name, "startup task registered");
        state.pending.push((handle.name.clone(), boxed));
        Ok(handle)
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Runs every pending task concurrently and closes the coordinator.
    ///
    /// All tasks are started and awaited even if some fail; the aggregate
    /// fails if any of them failed or panicked.
    pub async fn run_all(&self) -> Result<()> {
        let tasks = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(StartupError::AlreadyRun.into());
            }
            state.closed = true;
            std::mem::take(&mut state.pending)
        };

        let total = tasks.len();
        info!("running {} startup tasks", total);

        let (names, handles): (Vec<String>, Vec<_>) = tasks
            .into_iter()
            .map(|(name, task)| (name, tokio::spawn(task())))
            .unzip();

        let mut failures: Vec<Error> = Vec::new();
        for (name, outcome) in names.into_iter().zip(join_all(handles).await) {
            match outcome {
                Ok(Ok(())) => debug!(task = %name, "startup task finished"),
                Ok(Err(e)) => {
                    error!(task = %name, "startup task failed: {}", e);
                    failures.push(e);
                }
                Err(join_error) => {
                    error!(task = %name, "startup task aborted: {}", join_error);
                    failures.push(StartupError::TaskPanicked(name).into());
                }
            }
        }

        if failures.is_empty() {
            info!("all {} startup tasks finished", total);
            return Ok(());
        }

        let failed = failures.len();
        let first = failures.swap_remove(0);
        Err(StartupError::TasksFailed {
            failed,
            total,
            first: Box::new(first),
        }
        .into())
    }
}
