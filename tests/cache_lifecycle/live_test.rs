use std::sync::Arc;

use doc_mirror::ChangeKind;
use doc_mirror::SyncMode;
use parking_lot::Mutex;

use crate::common::eventually;
use crate::common::guild;
use crate::common::guild_collection;
use crate::common::start_context;

#[tokio::test]
async fn test_live_cache_applies_feed_events() {
    crate::enable_logger();
    let ctx = start_context(SyncMode::Live);
    let (upstream, collection, feed) = guild_collection("live_guilds", vec![guild("g1", 1)]);

    let cache = ctx.runtime.bind(collection, Some(feed)).expect("bind");
    ctx.runtime.start().await.expect("runtime starts");
    cache.initialized().await.expect("initialized");
    assert_eq!(cache.get("g1").map(|g| g.members), Some(1));

    upstream.upsert(guild("g1", 2));
    upstream.upsert(guild("g2", 7));
    assert!(
        eventually(|| cache.get("g1").map(|g| g.members) == Some(2) && cache.contains_key("g2")).await
    );

    upstream.remove("g1");
    assert!(eventually(|| !cache.contains_key("g1")).await);

    ctx.graceful_tx.send(()).expect("shutdown signal");
}

#[tokio::test]
async fn test_standalone_watcher_sees_every_kind() {
    crate::enable_logger();
    let ctx = start_context(SyncMode::Live);
    let (upstream, _, feed) = guild_collection("audit", vec![]);

    let watcher = ctx.runtime.watch(feed).expect("watch");
    let kinds: Arc<Mutex<Vec<ChangeKind>>> = Arc::default();
    for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
        let kinds = kinds.clone();
        watcher.on(kind, move |event| kinds.lock().push(event.kind()));
    }

    ctx.runtime.start().await.expect("runtime starts");
    watcher.initialized().await.expect("watcher ready");

    upstream.upsert(guild("g1", 1));
    upstream.upsert(guild("g1", 2));
    upstream.remove("g1");

    assert!(eventually(|| kinds.lock().len() == 3).await);
    assert_eq!(
        *kinds.lock(),
        vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
    );
}
