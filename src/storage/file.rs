//! Single-file JSON backend.
//!
//! Keeps the whole record set in memory and persists it as one pretty-printed
//! JSON document:
//!
//! ```json
//! { "records": { "<id>": { ... } }, "deleted_records": { "<id>": { ... } } }
//! ```
//!
//! Flushes write `<path>.tmp`, sync it, rename it over the target and sync
//! the parent directory, so an interrupted flush never corrupts the previous
//! document and a completed one survives a crash. Concurrent
//! processes sharing one path are not supported.

use super::memory::{not_open, read_lock, write_lock};
use super::metrics::timed;
use super::records::RecordSet;
use super::traits::KnowledgeStore;
use crate::models::{Entry, Filter};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::instrument;

const BACKEND: &str = "file";

#[derive(Debug, Default)]
struct FileState {
    set: Option<RecordSet>,
    dirty: bool,
}

/// JSON file knowledge store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

impl FileStore {
    /// Creates a store for `path`, creating its parent directory.
    ///
    /// The store is not open: call [`KnowledgeStore::open`] before use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::operation(
                    "create_knowledge_dir",
                    format!("{}: {e}", parent.display()),
                )
            })?;
        }
        Ok(Self {
            path,
            state: RwLock::new(FileState::default()),
        })
    }

    /// Creates and opens a store for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// file cannot be read or parsed.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path)?;
        store.open()?;
        Ok(store)
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if there are changes not yet flushed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        read_lock(&self.state).dirty
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn load(&self) -> Result<RecordSet> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no knowledge file yet, starting empty");
                return Ok(RecordSet::new());
            },
            Err(e) => {
                return Err(Error::operation(
                    "read_knowledge_file",
                    format!("{}: {e}", self.path.display()),
                ));
            },
        };
        serde_json::from_slice(&data).map_err(|e| {
            Error::operation(
                "parse_knowledge_file",
                format!("{}: {e}", self.path.display()),
            )
        })
    }

    fn write_atomic(&self, set: &RecordSet) -> Result<()> {
        let json = serde_json::to_vec_pretty(set)
            .map_err(|e| Error::operation("serialize_knowledge_file", e))?;
        let tmp = self.temp_path();

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            // leave the previous document untouched
            let _ = fs::remove_file(&tmp);
            Error::operation(
                "write_knowledge_file",
                format!("{}: {e}", self.path.display()),
            )
        })?;
        sync_parent(&self.path).map_err(|e| {
            Error::operation(
                "sync_knowledge_dir",
                format!("{}: {e}", self.path.display()),
            )
        })
    }

    fn flush_locked(&self, state: &mut FileState) -> Result<()> {
        if !state.dirty {
            return Ok(());
        }
        let set = state.set.as_ref().ok_or_else(|| not_open("flush"))?;
        self.write_atomic(set)?;
        state.dirty = false;
        tracing::info!(
            path = %self.path.display(),
            records = set.active_count(),
            deleted = set.deleted_count(),
            "knowledge file flushed"
        );
        Ok(())
    }

    fn with_read<T>(&self, operation: &str, f: impl FnOnce(&RecordSet) -> Result<T>) -> Result<T> {
        let guard = read_lock(&self.state);
        let set = guard.set.as_ref().ok_or_else(|| not_open(operation))?;
        f(set)
    }

    fn with_write<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut RecordSet) -> Result<T>,
    ) -> Result<T> {
        let mut guard = write_lock(&self.state);
        let state = &mut *guard;
        let set = state.set.as_mut().ok_or_else(|| not_open(operation))?;
        let value = f(set)?;
        state.dirty = true;
        Ok(value)
    }
}

impl KnowledgeStore for FileStore {
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

    #[instrument(skip(self), fields(backend = BACKEND, path = %self.path.display()))]
    fn open(&self) -> Result<()> {
        timed(BACKEND, "open", || {
            let mut state = write_lock(&self.state);
            if state.dirty {
                return Err(Error::operation(
                    "open",
                    "store has unflushed changes; flush or close first",
                ));
            }
            state.set = None;
            let set = self.load()?;
            tracing::info!(
                records = set.active_count(),
                deleted = set.deleted_count(),
                "knowledge file opened"
            );
            state.set = Some(set);
            Ok(())
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn flush(&self) -> Result<()> {
        timed(BACKEND, "flush", || {
            let mut state = write_lock(&self.state);
            self.flush_locked(&mut state)
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn close(&self) -> Result<()> {
        timed(BACKEND, "close", || {
            let mut state = write_lock(&self.state);
            self.flush_locked(&mut state)?;
            state.set = None;
            Ok(())
        })
    }

    fn info(&self) -> Result<BTreeMap<String, String>> {
        let guard = read_lock(&self.state);
        let set = guard.set.as_ref().ok_or_else(|| not_open("info"))?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(BTreeMap::from([
            ("implementation".to_string(), "FileStore".to_string()),
            ("file_path".to_string(), self.path.display().to_string()),
            ("file_name".to_string(), file_name),
            ("record_count".to_string(), set.active_count().to_string()),
            ("deleted_count".to_string(), set.deleted_count().to_string()),
            ("is_dirty".to_string(), guard.dirty.to_string()),
            ("persistent".to_string(), "true".to_string()),
        ]))
    }
}

/// Syncs the directory holding `path` so a rename into it is durable.
fn sync_parent(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
