use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// How caches are kept consistent with their upstream collection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Subscribe to the upstream change feed
    Live,
    /// Re-fetch and diff the whole collection on a fixed interval
    #[default]
    Polling,
}

impl fmt::Display for SyncMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SyncMode::Live => write!(f, "live"),
            SyncMode::Polling => write!(f, "polling"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Read once when a runtime builds its synchronizers
    #[serde(default)]
    pub mode: SyncMode,

    /// Interval between two poll-and-diff cycles (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the in-process change broadcaster of `MemCollection`
    #[serde(default = "default_feed_buffer_size")]
    pub feed_buffer_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            feed_buffer_size: default_feed_buffer_size(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "cache.poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.feed_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "cache.feed_buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_feed_buffer_size() -> usize {
    1024
}
