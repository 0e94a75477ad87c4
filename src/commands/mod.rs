//! Command handlers for the `knowstore` binary.
//!
//! Each handler runs one store operation and returns the JSON document the
//! binary prints on stdout.
//!
//! | Command | Store operation |
//! |---------|-----------------|
//! | `add` | `add_record` |
//! | `get` | `get_record` |
//! | `update` | `update_record` |
//! | `delete` / `restore` / `purge` | lifecycle transitions |
//! | `search` | `search_records` |
//! | `load` | `load_records` from a JSON array |
//! | `info` | `info` |

mod args;

pub use args::{EntryArgs, SearchArgs};

use crate::models::{Entry, Filter};
use crate::storage::KnowledgeStore;
use crate::{Error, Result};
use serde_json::{Value, json};
use std::io::Read;
use std::path::Path;

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::operation("encode_output", e))
}

/// Adds a record.
pub fn cmd_add(store: &dyn KnowledgeStore, entry: Entry) -> Result<Value> {
    let id = entry.id.clone();
    store.add_record(entry)?;
    Ok(json!({ "status": "added", "id": id }))
}

/// Fetches an active record.
pub fn cmd_get(store: &dyn KnowledgeStore, id: &str) -> Result<Value> {
    to_json(&store.get_record(id)?)
}

/// Replaces an active record.
pub fn cmd_update(store: &dyn KnowledgeStore, entry: Entry) -> Result<Value> {
    let id = entry.id.clone();
    store.update_record(entry)?;
    Ok(json!({ "status": "updated", "id": id }))
}

/// Soft-deletes a record.
pub fn cmd_delete(store: &dyn KnowledgeStore, id: &str) -> Result<Value> {
    store.delete_record(id)?;
    Ok(json!({ "status": "deleted", "id": id }))
}

/// Restores a soft-deleted record.
pub fn cmd_restore(store: &dyn KnowledgeStore, id: &str) -> Result<Value> {
    store.restore_record(id)?;
    Ok(json!({ "status": "restored", "id": id }))
}

/// Permanently removes a record.
pub fn cmd_purge(store: &dyn KnowledgeStore, id: &str) -> Result<Value> {
    store.purge_record(id)?;
    Ok(json!({ "status": "purged", "id": id }))
}

/// Runs a filtered search.
pub fn cmd_search(store: &dyn KnowledgeStore, filter: &Filter) -> Result<Value> {
    to_json(&store.search_records(filter)?)
}

/// Bulk-loads records from a JSON array in `path` (`-` reads stdin).
pub fn cmd_load(store: &dyn KnowledgeStore, path: &Path) -> Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Error::operation("read_stdin", e))?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_load_file", format!("{}: {e}", path.display())))?
    };
    let entries = parse_entries(&raw)?;
    let count = entries.len();
    store.load_records(entries)?;
    Ok(json!({ "status": "loaded", "count": count }))
}

/// Parses a JSON array of records.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not an array of records.
pub fn parse_entries(raw: &str) -> Result<Vec<Entry>> {
    serde_json::from_str(raw).map_err(|e| Error::InvalidInput(format!("invalid record batch: {e}")))
}

/// Reports backend details.
pub fn cmd_info(store: &dyn KnowledgeStore) -> Result<Value> {
    to_json(&store.info()?)
}
