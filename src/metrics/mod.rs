use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref CHANGE_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("doc_mirror_change_events_total", "Change events applied to a cache"),
        &["collection", "kind"]
    )
    .expect("metric can not be created");

    pub static ref RELOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("doc_mirror_reloads_total", "Full reloads by outcome"),
        &["collection", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref LISTENER_PANICS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("doc_mirror_listener_panics_total", "Listener callbacks that panicked"),
        &["collection"]
    )
    .expect("metric can not be created");

    pub static ref CACHE_ENTRIES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("doc_mirror_cache_entries", "Documents currently held by a cache"),
        &["collection"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(CHANGE_EVENTS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(RELOADS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(LISTENER_PANICS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(CACHE_ENTRIES.clone()))
            .expect("collector can be registered");
    });
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_text())
}

/// Renders every registered collector in the prometheus text format.
pub fn gather_text() -> String {
    use prometheus::Encoder;

    register_custom_metrics();
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
