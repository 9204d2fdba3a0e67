//! Time-limited local copy of the last fetched payload.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{keys, KeyValueStore};

/// Stored form under [`keys::CACHE`]: `{"content": ..., "timestamp": <epoch ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub content: String,
    pub timestamp: i64,
}

impl CachedPayload {
    pub fn new(content: impl Into<String>, stored_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp: stored_at.timestamp_millis(),
        }
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
    }

    /// Fresh while `now - stored_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age_ms = i128::from(now.timestamp_millis()) - i128::from(self.timestamp);
        age_ms < ttl.as_millis() as i128
    }
}

/// Cache view over a [`KeyValueStore`].
pub struct PayloadCache<'a, S> {
    store: &'a S,
    ttl: Duration,
}

impl<'a, S: KeyValueStore> PayloadCache<'a, S> {
    pub fn new(store: &'a S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store_payload(&self, content: &str, now: DateTime<Utc>) -> Result<()> {
        let entry = CachedPayload::new(content, now);
        self.store
            .set(keys::CACHE, &serde_json::to_string(&entry)?)?;
        debug!(bytes = content.len(), "payload cached locally");
        Ok(())
    }

    /// Stored entry regardless of age. Unparseable entries read as absent.
    pub fn peek(&self) -> Result<Option<CachedPayload>> {
        let Some(raw) = self.store.get(keys::CACHE)? else {
            return Ok(None);
        };
        match serde_json::from_str::<CachedPayload>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Cached content if it is still within the TTL at `now`.
    pub fn load_fresh(&self, now: DateTime<Utc>) -> Result<Option<String>> {
        let Some(entry) = self.peek()? else {
            return Ok(None);
        };
        if entry.is_fresh(self.ttl, now) {
            Ok(Some(entry.content))
        } else {
            debug!(stored_at = entry.timestamp, "cached payload expired");
            Ok(None)
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(keys::CACHE)
    }
}
