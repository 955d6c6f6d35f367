//! A builder for the [`Runtime`] composition root.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let runtime = RuntimeBuilder::new(settings, shutdown_rx)
//!     .start_metrics_server()
//!     .build();
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::CacheRegistry;
use super::Runtime;
use crate::metrics;
use crate::Result;
use crate::Settings;
use crate::StartupCoordinator;

pub struct RuntimeBuilder {
    settings: Settings,
    shutdown_signal: watch::Receiver<()>,
}

impl RuntimeBuilder {
    pub fn new(
        settings: Settings,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            settings,
            shutdown_signal,
        }
    }

    /// Loads and validates settings from file and environment.
    pub fn from_env(shutdown_signal: watch::Receiver<()>) -> Result<Self> {
        let settings = Settings::new()?.validate()?;
        Ok(Self::new(settings, shutdown_signal))
    }

    /// Spawns the prometheus endpoint when `monitoring.prometheus_enabled`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_metrics_server(self) -> Self {
        if self.settings.monitoring.prometheus_enabled {
            let port = self.settings.monitoring.prometheus_port;
            info!("metrics server listening on port {}", port);
            tokio::spawn(metrics::start_server(port, self.shutdown_signal.clone()));
        }
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            settings: Arc::new(self.settings),
            coordinator: StartupCoordinator::new(),
            registry: CacheRegistry::new(),
            shutdown_signal: self.shutdown_signal,
            ready: AtomicBool::new(false),
        }
    }
}
