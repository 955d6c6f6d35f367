use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::LiveFeedStrategy;
use super::PollingStrategy;
use super::SyncBinding;
use super::SyncStrategy;
use crate::test_utils::doc;
use crate::test_utils::wait_until;
use crate::test_utils::ChannelSource;
use crate::test_utils::TestDoc;
use crate::ChangeFeedWatcher;
use crate::ChangeStreamSource;
use crate::Collection;
use crate::CollectionError;
use crate::Error;
use crate::MemCollection;
use crate::MockCollection;
use crate::RawChange;
use crate::ReactiveMap;
use crate::StreamItem;
use crate::WatcherError;
use crate::WatcherState;

fn binding_over(collection: Arc<MemCollection<TestDoc>>) -> SyncBinding<TestDoc> {
    let name = Collection::name(collection.as_ref());
    let dyn_collection: Arc<dyn Collection<TestDoc>> = collection;
    SyncBinding::new(Arc::new(ReactiveMap::new(name)), dyn_collection)
}

#[tokio::test]
async fn test_live_strategy_waits_for_feed_then_reconciles() {
    let collection = Arc::new(MemCollection::with_documents("live", 16, [doc("a", 1)]));
    let binding = binding_over(collection);
    let map = binding.map().clone();

    let (source, tx) = ChannelSource::<TestDoc>::new("live");
    let source: Arc<dyn ChangeStreamSource<TestDoc>> = Arc::new(source);
    let watcher = Arc::new(ChangeFeedWatcher::new(source));
    let strategy = LiveFeedStrategy::new(watcher.clone(), None);
    assert_eq!(SyncStrategy::<TestDoc>::name(&strategy), "live");

    let activation = tokio::spawn(async move { strategy.activate(binding).await });

    // replayed change arrives before readiness and is applied straight away
    assert!(wait_until(Duration::from_secs(1), || watcher.state() == WatcherState::Replaying).await);
    tx.send(StreamItem::Change(RawChange::insert(doc("ghost", 1)))).unwrap();
    assert!(wait_until(Duration::from_secs(1), || map.contains_key("ghost")).await);
    assert!(!map.is_initialized());

    tx.send(StreamItem::ResumeTokenChanged("t1".into())).unwrap();
    activation.await.unwrap().unwrap();

    // the reload after readiness dropped what the collection does not hold
    assert!(map.is_initialized());
    assert!(map.contains_key("a"));
    assert!(!map.contains_key("ghost"));

    tx.send(StreamItem::Change(RawChange::update("a", Some(doc("a", 2)), None)))
        .unwrap();
    assert!(wait_until(Duration::from_secs(1), || map.get("a").map(|d| d.v) == Some(2)).await);

    tx.send(StreamItem::Change(RawChange::delete("a", None))).unwrap();
    assert!(wait_until(Duration::from_secs(1), || map.is_empty()).await);
}

#[tokio::test]
async fn test_live_strategy_open_failure() {
    let collection = Arc::new(MemCollection::<TestDoc>::new("live_broken", 16));
    let binding = binding_over(collection);
    let map = binding.map().clone();

    let source: Arc<dyn ChangeStreamSource<TestDoc>> = Arc::new(ChannelSource::failing("live_broken"));
    let strategy = LiveFeedStrategy::new(Arc::new(ChangeFeedWatcher::new(source)), None);

    assert!(matches!(
        strategy.activate(binding).await,
        Err(Error::Watcher(WatcherError::OpenFailed { .. }))
    ));
    assert!(!map.is_initialized());
}

#[tokio::test]
async fn test_live_strategy_fails_when_feed_ends_before_ready() {
    let collection = Arc::new(MemCollection::with_documents("live_ended", 16, [doc("a", 1)]));
    let binding = binding_over(collection);
    let map = binding.map().clone();

    let (source, tx) = ChannelSource::<TestDoc>::new("live_ended");
    let source: Arc<dyn ChangeStreamSource<TestDoc>> = Arc::new(source);
    let watcher = Arc::new(ChangeFeedWatcher::new(source));
    let strategy = LiveFeedStrategy::new(watcher.clone(), None);

    let activation = tokio::spawn(async move { strategy.activate(binding).await });
    assert!(wait_until(Duration::from_secs(1), || watcher.state() == WatcherState::Replaying).await);
    tx.send(StreamItem::Error("cursor killed".into())).unwrap();
    drop(tx);

    let result = tokio::time::timeout(Duration::from_secs(2), activation)
        .await
        .expect("activation settles when the feed ends")
        .unwrap();
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert!(!map.is_initialized());
    assert!(!map.contains_key("a"));
}

#[tokio::test]
async fn test_live_strategy_fails_on_shutdown_before_ready() {
    let collection = Arc::new(MemCollection::<TestDoc>::new("live_stopped", 16));
    let binding = binding_over(collection);

    let (source, _tx) = ChannelSource::<TestDoc>::new("live_stopped");
    let source: Arc<dyn ChangeStreamSource<TestDoc>> = Arc::new(source);
    let watcher = Arc::new(ChangeFeedWatcher::new(source));
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let strategy = LiveFeedStrategy::new(watcher.clone(), Some(shutdown_rx));

    let activation = tokio::spawn(async move { strategy.activate(binding).await });
    assert!(wait_until(Duration::from_secs(1), || watcher.state() == WatcherState::Replaying).await);
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), activation)
        .await
        .expect("activation settles on shutdown")
        .unwrap();
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_polling_strategy_reloads_every_period() {
    let collection = Arc::new(MemCollection::with_documents("polling", 16, [doc("a", 1)]));
    let binding = binding_over(collection.clone());
    let map = binding.map().clone();

    let strategy = PollingStrategy::new(Duration::from_secs(1), None).unwrap();
    assert_eq!(strategy.period(), Duration::from_secs(1));
    strategy.activate(binding).await.unwrap();

    assert!(map.is_initialized());
    assert_eq!(map.len(), 1);

    collection.upsert(doc("b", 1));
    collection.upsert(doc("a", 2));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!map.contains_key("b"), "no reload before the first period");

    assert!(wait_until(Duration::from_secs(2), || map.contains_key("b")).await);
    assert_eq!(map.get("a").map(|d| d.v), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_polling_survives_failed_cycles() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut collection = MockCollection::<TestDoc>::new();
    collection.expect_find_all().returning(move || {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(vec![doc("a", 1)]),
            1 => Err(CollectionError::Unavailable("timeout".into()).into()),
            _ => Ok(vec![doc("a", 1), doc("b", 1)]),
        }
    });
    let binding = SyncBinding::new(Arc::new(ReactiveMap::new("flaky")), Arc::new(collection));
    let map = binding.map().clone();

    PollingStrategy::new(Duration::from_secs(1), None).unwrap()
        .activate(binding)
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || map.contains_key("b")).await);
    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert!(map.contains_key("a"));
}

#[tokio::test]
async fn test_polling_initial_failure_is_returned() {
    let mut collection = MockCollection::<TestDoc>::new();
    collection
        .expect_find_all()
        .times(1)
        .returning(|| Err(CollectionError::Unavailable("down".into()).into()));
    let binding = SyncBinding::new(Arc::new(ReactiveMap::new("down")), Arc::new(collection));
    let map = binding.map().clone();

    let result = PollingStrategy::new(Duration::from_secs(1), None)
        .unwrap()
        .activate(binding)
        .await;
    assert!(matches!(result, Err(Error::Collection(CollectionError::FetchFailed { .. }))));
    assert!(!map.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_on_shutdown() {
    let collection = Arc::new(MemCollection::with_documents("poll_shutdown", 16, [doc("a", 1)]));
    let binding = binding_over(collection.clone());
    let map = binding.map().clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    PollingStrategy::new(Duration::from_secs(1), Some(shutdown_rx)).unwrap()
        .activate(binding)
        .await
        .unwrap();

    shutdown_tx.send(()).unwrap();
    tokio::task::yield_now().await;

    collection.upsert(doc("b", 1));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!map.contains_key("b"));
}

#[test]
fn test_polling_rejects_zero_period() {
    assert!(matches!(
        PollingStrategy::new(Duration::ZERO, None),
        Err(Error::InvalidConfig(_))
    ));
    assert!(PollingStrategy::new(Duration::from_millis(1), None).is_ok());
}
