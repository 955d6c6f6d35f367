use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::Document;
use crate::MapEvent;
use crate::ReactiveMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TestDoc {
    pub id: String,
    pub v: i64,
}

impl Document for TestDoc {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn doc(
    id: &str,
    v: i64,
) -> TestDoc {
    TestDoc { id: id.to_string(), v }
}

/// Records every add/delete notification of a map, in emission order
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(MapEvent, TestDoc)>>>,
}

impl EventRecorder {
    pub fn attach(map: &ReactiveMap<TestDoc>) -> Self {
        let recorder = Self::default();
        for event in [MapEvent::Add, MapEvent::Delete] {
            let events = recorder.events.clone();
            map.on(event, move |d: &TestDoc| events.lock().push((event, d.clone())));
        }
        recorder
    }

    pub fn events(&self) -> Vec<(MapEvent, TestDoc)> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

/// Polls `condition` every few milliseconds until it holds or `timeout` elapses.
pub async fn wait_until<F>(
    timeout: Duration,
    condition: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
