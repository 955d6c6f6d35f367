use std::sync::Arc;
use std::time::Duration;

use doc_mirror::ChangeStreamSource;
use doc_mirror::Collection;
use doc_mirror::Document;
use doc_mirror::MemCollection;
use doc_mirror::Runtime;
use doc_mirror::RuntimeBuilder;
use doc_mirror::Settings;
use doc_mirror::SyncMode;
use tokio::sync::watch;

pub const POLL_INTERVAL_MS: u64 = 50;
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct Guild {
    pub id: String,
    pub name: String,
    pub members: u32,
}

impl Document for Guild {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn guild(
    id: &str,
    members: u32,
) -> Guild {
    Guild {
        id: id.to_string(),
        name: format!("guild-{id}"),
        members,
    }
}

pub struct TestContext {
    pub runtime: Runtime,
    pub graceful_tx: watch::Sender<()>,
}

pub fn start_context(mode: SyncMode) -> TestContext {
    let mut settings = Settings::default();
    settings.cache.mode = mode;
    settings.cache.poll_interval_ms = POLL_INTERVAL_MS;
    let settings = settings.validate().expect("test settings are valid");

    let (graceful_tx, graceful_rx) = watch::channel(());
    TestContext {
        runtime: RuntimeBuilder::new(settings, graceful_rx).build(),
        graceful_tx,
    }
}

pub fn guild_collection(
    name: &str,
    guilds: Vec<Guild>,
) -> (
    Arc<MemCollection<Guild>>,
    Arc<dyn Collection<Guild>>,
    Arc<dyn ChangeStreamSource<Guild>>,
) {
    let upstream = Arc::new(MemCollection::with_documents(name, 64, guilds));
    (upstream.clone(), upstream.clone(), upstream)
}

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
