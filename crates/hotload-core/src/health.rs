//! Health telemetry persisted across runs.
//!
//! Only the most recent success, the most recent failure and the last
//! resolved revision are kept; every write overwrites a single key.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::store::{keys, KeyValueStore};
use crate::types::Revision;

// ---------------------------------------------------------------------------
// HealthRecord / HealthStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthRecord {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_revision: Option<Revision>,
}

impl HealthRecord {
    /// Healthy iff a success exists and it is newer than any failure.
    pub fn status(&self) -> HealthStatus {
        match (self.last_success_at, self.last_failure_at) {
            (Some(ok), Some(failed)) if ok > failed => HealthStatus::Healthy,
            (Some(_), None) => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == HealthStatus::Healthy
    }
}

// ---------------------------------------------------------------------------
// HealthReport
// ---------------------------------------------------------------------------

/// Status object published for external monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub last_success: Option<String>,
    pub last_failure: Option<String>,
    pub healthy: bool,
    pub status: HealthStatus,
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&HealthRecord> for HealthReport {
    fn from(record: &HealthRecord) -> Self {
        let status = record.status();
        Self {
            last_success: record.last_success_at.map(iso),
            last_failure: record.last_failure_at.map(iso),
            healthy: status == HealthStatus::Healthy,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// HealthStore
// ---------------------------------------------------------------------------

/// Health view over a [`KeyValueStore`].
pub struct HealthStore<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> HealthStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn record_success(&self, revision: Option<&Revision>) -> Result<()> {
        self.record_success_at(revision, Utc::now())
    }

    /// Stamps `last_success`; a `None` revision leaves the stored one in place.
    pub fn record_success_at(&self, revision: Option<&Revision>, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set(keys::LAST_SUCCESS, &at.timestamp_millis().to_string())?;
        if let Some(rev) = revision {
            self.store.set(keys::LAST_COMMIT_HASH, rev.as_str())?;
        }
        Ok(())
    }

    pub fn record_failure(&self) -> Result<()> {
        self.record_failure_at(Utc::now())
    }

    pub fn record_failure_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set(keys::LAST_FAILURE, &at.timestamp_millis().to_string())
    }

    pub fn read(&self) -> Result<HealthRecord> {
        Ok(HealthRecord {
            last_success_at: self.read_timestamp(keys::LAST_SUCCESS)?,
            last_failure_at: self.read_timestamp(keys::LAST_FAILURE)?,
            last_revision: self.last_revision()?,
        })
    }

    pub fn last_revision(&self) -> Result<Option<Revision>> {
        Ok(self
            .store
            .get(keys::LAST_COMMIT_HASH)?
            .and_then(Revision::new))
    }

    pub fn report(&self) -> Result<HealthReport> {
        Ok(HealthReport::from(&self.read()?))
    }

    fn read_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        if parsed.is_none() {
            warn!(key, value = %raw, "ignoring malformed health timestamp");
        }
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn empty_store_is_degraded() {
        let store = MemoryStore::new();
        let record = HealthStore::new(&store).read().unwrap();
        assert_eq!(record, HealthRecord::default());
        assert_eq!(record.status(), HealthStatus::Degraded);
    }

    #[test]
    fn success_only_is_healthy() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        health.record_success_at(None, at(1_000)).unwrap();
        assert!(health.read().unwrap().is_healthy());
    }

    #[test]
    fn failure_after_success_is_degraded() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        health.record_success_at(None, at(1_000)).unwrap();
        health.record_failure_at(at(2_000)).unwrap();
        assert_eq!(health.read().unwrap().status(), HealthStatus::Degraded);
    }

    #[test]
    fn success_after_failure_is_healthy() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        health.record_failure_at(at(1_000)).unwrap();
        health.record_success_at(None, at(2_000)).unwrap();
        assert!(health.read().unwrap().is_healthy());
    }

    #[test]
    fn equal_timestamps_are_degraded() {
        let record = HealthRecord {
            last_success_at: Some(at(5)),
            last_failure_at: Some(at(5)),
            last_revision: None,
        };
        assert_eq!(record.status(), HealthStatus::Degraded);
    }

    #[test]
    fn success_records_revision() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        let rev = Revision::new("abc123").unwrap();
        health.record_success_at(Some(&rev), at(1)).unwrap();
        assert_eq!(health.last_revision().unwrap(), Some(rev));
        assert_eq!(
            store.get(keys::LAST_COMMIT_HASH).unwrap(),
            Some("abc123".into())
        );
    }

    #[test]
    fn success_without_revision_keeps_previous() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        let rev = Revision::new("abc123").unwrap();
        health.record_success_at(Some(&rev), at(1)).unwrap();
        health.record_success_at(None, at(2)).unwrap();
        assert_eq!(health.last_revision().unwrap(), Some(rev));
    }

    #[test]
    fn timestamps_persist_as_epoch_millis() {
        let store = MemoryStore::new();
        HealthStore::new(&store)
            .record_failure_at(at(1_700_000_000_123))
            .unwrap();
        assert_eq!(
            store.get(keys::LAST_FAILURE).unwrap(),
            Some("1700000000123".into())
        );
    }

    #[test]
    fn malformed_timestamp_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(keys::LAST_SUCCESS, "yesterday").unwrap();
        let record = HealthStore::new(&store).read().unwrap();
        assert_eq!(record.last_success_at, None);
    }

    #[test]
    fn report_uses_iso_timestamps_and_camel_case() {
        let store = MemoryStore::new();
        let health = HealthStore::new(&store);
        health.record_success_at(None, at(0)).unwrap();
        let report = health.report().unwrap();
        assert_eq!(report.last_success.as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(report.last_failure, None);
        assert!(report.healthy);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["lastSuccess"], "1970-01-01T00:00:00.000Z");
        assert_eq!(json["lastFailure"], serde_json::Value::Null);
        assert_eq!(json["status"], "healthy");
    }
}
