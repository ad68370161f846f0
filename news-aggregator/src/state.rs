use crate::traits::KeyValueStore;
use crate::types::{Article, CacheEntry, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SNAPSHOT_KEY: &str = "articles.snapshot";
pub const LAST_FETCH_KEY: &str = "articles.last_fetch";
pub const SAVED_KEY: &str = "articles.saved";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    articles: Vec<Article>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Merged snapshot plus its fetch timestamp, kept in a key-value store.
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// A snapshot without a last-fetch timestamp reads as fetched at epoch 0.
    pub async fn read(&self) -> Result<Option<CacheEntry>> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY).await? else {
            debug!("No cached snapshot");
            return Ok(None);
        };

        let snapshot: StoredSnapshot = match serde_json::from_value(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable cached snapshot: {}", e);
                return Ok(None);
            }
        };

        let fetched_at = self
            .store
            .get(LAST_FETCH_KEY)
            .await?
            .and_then(|value| value.as_i64())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_default();

        Ok(Some(CacheEntry {
            articles: snapshot.articles,
            fetched_at,
            errors: snapshot.errors,
        }))
    }

    pub async fn write(&self, entry: &CacheEntry) -> Result<()> {
        let snapshot = StoredSnapshot {
            articles: entry.articles.clone(),
            errors: entry.errors.clone(),
        };
        self.store.set(SNAPSHOT_KEY, serde_json::to_value(&snapshot)?).await?;
        self.store
            .set(LAST_FETCH_KEY, json!(entry.fetched_at.timestamp_millis()))
            .await?;

        info!(
            "Cached {} articles fetched at {}",
            entry.articles.len(),
            entry.fetched_at.to_rfc3339()
        );
        Ok(())
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.fetched_at) < self.ttl
    }

    /// Reset the fetch timestamp to epoch 0 so the next freshness check fails.
    pub async fn invalidate(&self) -> Result<()> {
        self.store.set(LAST_FETCH_KEY, json!(0)).await?;
        debug!("Cache invalidated");
        Ok(())
    }
}

/// The externally owned saved-id set.
pub struct SavedArticles {
    store: Arc<dyn KeyValueStore>,
}

impl SavedArticles {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<HashSet<String>> {
        let ids = match self.store.get(SAVED_KEY).await? {
            Some(Value::Array(values)) => values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                warn!("Ignoring malformed saved set: {}", other);
                HashSet::new()
            }
            None => HashSet::new(),
        };
        Ok(ids)
    }

    /// Flip the saved flag for `id`; returns the new state.
    pub async fn toggle(&self, id: &str) -> Result<bool> {
        let mut ids = self.load().await?;
        let saved = if ids.remove(id) {
            false
        } else {
            ids.insert(id.to_string());
            true
        };

        let mut sorted: Vec<String> = ids.into_iter().collect();
        sorted.sort();
        self.store.set(SAVED_KEY, json!(sorted)).await?;

        Ok(saved)
    }
}
