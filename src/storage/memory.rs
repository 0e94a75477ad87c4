//! Volatile in-memory backend.
//!
//! Data lives only as long as the store is open: `open` starts from an empty
//! set and `close` drops everything.

use super::metrics::timed;
use super::records::RecordSet;
use super::traits::KnowledgeStore;
use crate::models::{Entry, Filter};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

const BACKEND: &str = "memory";

/// Acquires a read guard, recovering from poisoning.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("store lock was poisoned, recovering");
        metrics::counter!("knowstore_lock_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}

/// Acquires a write guard, recovering from poisoning.
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("store lock was poisoned, recovering");
        metrics::counter!("knowstore_lock_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}

pub(crate) fn not_open(operation: &str) -> Error {
    Error::operation(operation, "store is not open")
}

/// In-memory knowledge store.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<Option<RecordSet>>,
}

impl MemoryStore {
    /// Creates an open, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Some(RecordSet::new())),
        }
    }

    fn with_read<T>(&self, operation: &str, f: impl FnOnce(&RecordSet) -> Result<T>) -> Result<T> {
        let guard = read_lock(&self.state);
        let set = guard.as_ref().ok_or_else(|| not_open(operation))?;
        f(set)
    }

    fn with_write<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut RecordSet) -> Result<T>,
    ) -> Result<T> {
        let mut guard = write_lock(&self.state);
        let set = guard.as_mut().ok_or_else(|| not_open(operation))?;
        f(set)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStore for MemoryStore {
    #[instrument(skip(self, entry), fields(backend = BACKEND, id = %entry.id))]
    fn add_record(&self, entry: Entry) -> Result<()> {
        timed(BACKEND, "add", || {
            self.with_write("add_record", |set| set.add(entry, Utc::now()))
        })?;
        tracing::debug!("record added");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn get_record(&self, id: &str) -> Result<Entry> {
        timed(BACKEND, "get", || self.with_read("get_record", |set| set.get(id)))
    }

    #[instrument(skip(self, entry), fields(backend = BACKEND, id = %entry.id))]
    fn update_record(&self, entry: Entry) -> Result<()> {
        timed(BACKEND, "update", || {
            self.with_write("update_record", |set| set.update(entry, Utc::now()))
        })?;
        tracing::debug!("record updated");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn delete_record(&self, id: &str) -> Result<()> {
        timed(BACKEND, "delete", || {
            self.with_write("delete_record", |set| set.delete(id))
        })?;
        tracing::debug!("record deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn restore_record(&self, id: &str) -> Result<()> {
        timed(BACKEND, "restore", || {
            self.with_write("restore_record", |set| set.restore(id))
        })?;
        tracing::debug!("record restored");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn purge_record(&self, id: &str) -> Result<()> {
        timed(BACKEND, "purge", || {
            self.with_write("purge_record", |set| set.purge(id))
        })?;
        tracing::debug!("record purged");
        Ok(())
    }

    #[instrument(skip(self, filter), fields(backend = BACKEND))]
    fn search_records(&self, filter: &Filter) -> Result<Vec<Entry>> {
        timed(BACKEND, "search", || {
            self.with_read("search_records", |set| Ok(set.search(filter)))
        })
    }

    #[instrument(skip(self, entries), fields(backend = BACKEND, count = entries.len()))]
    fn load_records(&self, entries: Vec<Entry>) -> Result<()> {
        timed(BACKEND, "load", || {
            self.with_write("load_records", |set| set.load(entries, Utc::now()))
        })
    }

    fn open(&self) -> Result<()> {
        *write_lock(&self.state) = Some(RecordSet::new());
        tracing::info!(backend = BACKEND, "store opened");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *write_lock(&self.state) = None;
        tracing::info!(backend = BACKEND, "store closed");
        Ok(())
    }

    fn info(&self) -> Result<BTreeMap<String, String>> {
        self.with_read("info", |set| {
            Ok(BTreeMap::from([
                ("implementation".to_string(), "MemoryStore".to_string()),
                ("record_count".to_string(), set.active_count().to_string()),
                ("deleted_count".to_string(), set.deleted_count().to_string()),
                ("persistent".to_string(), "false".to_string()),
            ]))
        })
    }
}
