use std::sync::Arc;

use doc_mirror::MapEvent;
use doc_mirror::SyncMode;
use parking_lot::Mutex;

use crate::common::eventually;
use crate::common::guild;
use crate::common::guild_collection;
use crate::common::start_context;
use crate::common::Guild;

/// Boot a polling cache, then mutate the upstream and watch the diff land.
#[tokio::test]
async fn test_polling_cache_tracks_upstream() {
    crate::enable_logger();
    let ctx = start_context(SyncMode::Polling);
    let (upstream, collection, feed) = guild_collection("guilds", vec![guild("g1", 10), guild("g2", 3)]);

    let cache = ctx.runtime.bind(collection, Some(feed)).expect("bind guilds");
    let events: Arc<Mutex<Vec<(MapEvent, String, u32)>>> = Arc::default();
    for event in [MapEvent::Add, MapEvent::Delete] {
        let events = events.clone();
        cache.on(event, move |g: &Guild| events.lock().push((event, g.id.clone(), g.members)));
    }

    ctx.runtime.start().await.expect("runtime starts");
    assert!(ctx.runtime.is_ready());
    assert_eq!(cache.len(), 2);
    events.lock().clear();

    upstream.upsert(guild("g1", 11));
    upstream.remove("g2");
    upstream.upsert(guild("g3", 1));

    assert!(eventually(|| events.lock().len() == 4).await, "events: {:?}", events.lock());
    let mut seen = events.lock().clone();
    seen.sort_by(|l, r| (l.1.as_str(), l.2).cmp(&(r.1.as_str(), r.2)));
    assert_eq!(
        seen,
        vec![
            (MapEvent::Delete, "g1".to_string(), 10),
            (MapEvent::Add, "g1".to_string(), 11),
            (MapEvent::Delete, "g2".to_string(), 3),
            (MapEvent::Add, "g3".to_string(), 1),
        ]
    );

    ctx.graceful_tx.send(()).expect("shutdown signal");
}

#[tokio::test]
async fn test_cache_lookup_by_name() {
    crate::enable_logger();
    let ctx = start_context(SyncMode::Polling);
    let (_, collection, _) = guild_collection("lookup", vec![guild("g1", 1)]);
    let cache = ctx.runtime.bind(collection, None).expect("bind");

    ctx.runtime.start().await.expect("runtime starts");

    let found = ctx
        .runtime
        .cache::<Guild>("lookup")
        .expect("same document type")
        .expect("bound cache");
    assert!(Arc::ptr_eq(&found, &cache));
    assert!(found
        .find(|g| g.members == 1)
        .is_some_and(|g| g.name == "guild-g1"));
}
