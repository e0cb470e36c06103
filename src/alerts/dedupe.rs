//! Alert-storm suppression.
//!
//! At most one alert per (home, category, event type) is admitted per
//! cooldown window. Admission is a single atomic set-if-absent-with-TTL on
//! the shared store; there is no separate read before the write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::core::{Category, Event};
use crate::error::DedupeError;

/// Shared keyed TTL store backing the deduplicator.
#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// Installs `key` for `ttl` unless a live entry exists. Returns `true`
    /// when the key was installed by this call.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, DedupeError>;
    async fn exists(&self, key: &str) -> Result<bool, DedupeError>;
}

/// In-process store. Sharded, so unrelated keys don't contend.
#[derive(Debug, Default)]
pub struct MemoryDedupeStore {
    expiries: DashMap<String, Instant>,
}

impl MemoryDedupeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose cooldown has elapsed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.expiries.len();
        self.expiries.retain(|_, expiry| *expiry > now);
        before - self.expiries.len()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[async_trait]
impl DedupeStore for MemoryDedupeStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, DedupeError> {
        let now = Instant::now();
        // The entry guard holds the shard lock, making check-and-set atomic per key.
        match self.expiries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return Ok(false);
                }
                entry.insert(now + ttl);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(now + ttl);
                Ok(true)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DedupeError> {
        Ok(self
            .expiries
            .get(key)
            .is_some_and(|expiry| *expiry > Instant::now()))
    }
}

/// Admits or suppresses candidate events.
///
/// If the store cannot answer, the event is admitted (fail open): a
/// duplicate alert is preferable to a missed gas or leak alarm.
pub struct Deduplicator {
    store: Arc<dyn DedupeStore>,
    cooldown: Duration,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn DedupeStore>, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    pub fn key(category: Category, event: &Event) -> String {
        format!("alert:{}:{category}:{}", event.home_id, event.event_type)
    }

    /// `true` if the event should be delivered.
    pub async fn admit(&self, category: Category, event: &Event) -> bool {
        let key = Self::key(category, event);
        match self.store.set_if_absent(&key, self.cooldown).await {
            Ok(true) => true,
            Ok(false) => {
                debug!("Suppressed duplicate alert {key}");
                false
            }
            Err(e) => {
                warn!("Dedupe check failed for {key}, admitting: {e}");
                true
            }
        }
    }
}
