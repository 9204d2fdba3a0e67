//! Process-restart-surviving key/value state.
//!
//! The pipeline only ever needs scalar string values under a handful of
//! fixed keys (see [`keys`]), so the store contract is a plain string map.
//! Two implementations ship:
//!
//! - [`RedbStore`]: a single `kv` table in a redb file, used by the CLI.
//! - [`MemoryStore`]: a mutex-guarded map for tests and embedders that keep
//!   state elsewhere.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{LoaderError, Result};

/// Persisted key names.
pub mod keys {
    /// JSON `{content, timestamp}` of the last successfully fetched payload.
    pub const CACHE: &str = "remote_script_cache";
    /// Revision recorded by the last successful run.
    pub const LAST_COMMIT_HASH: &str = "last_commit_hash";
    /// Epoch milliseconds of the last successful run.
    pub const LAST_SUCCESS: &str = "last_success";
    /// Epoch milliseconds of the last failed run.
    pub const LAST_FAILURE: &str = "last_failure";
}

/// Narrow persistence capability supplied by the host.
///
/// Writes are last-writer-wins overwrites of a single key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| LoaderError::Store("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// Key: persisted key name. Value: raw string value.
const KV: TableDefinition<&str, &str> = TableDefinition::new("kv");

fn store_err(e: impl std::fmt::Display) -> LoaderError {
    LoaderError::Store(e.to_string())
}

/// Durable store backed by a single redb file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the redb database at `path`.
    ///
    /// Creates parent directories and the `kv` table if they don't exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        // Ensure the table exists before any reads
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(KV).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(KV).map_err(store_err)?;
        let value = table.get(key).map_err(store_err)?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(KV).map_err(store_err)?;
            table.insert(key, value).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(KV).map_err(store_err)?;
            table.remove(key).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
