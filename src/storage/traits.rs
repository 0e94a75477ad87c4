//! The storage contract shared by all backends.

use crate::Result;
use crate::models::{Entry, Filter};
use std::collections::BTreeMap;

/// A store of knowledge entries with soft-delete lifecycle and filtered search.
///
/// Every entry is either active or deleted. Deleted entries are hidden from
/// [`get_record`](Self::get_record) and from searches unless the filter asks
/// for them, and can be restored or purged.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait KnowledgeStore: Send + Sync {
    /// Adds a new entry, filling unset creation and update times.
    ///
    /// Fails if the ID is empty or already present, active or deleted.
    fn add_record(&self, entry: Entry) -> Result<()>;

    /// Returns an active entry. Deleted entries are not found.
    fn get_record(&self, id: &str) -> Result<Entry>;

    /// Replaces an active entry.
    ///
    /// The stored creation time is kept when the input leaves it unset.
    fn update_record(&self, entry: Entry) -> Result<()>;

    /// Moves an active entry to the deleted state.
    fn delete_record(&self, id: &str) -> Result<()>;

    /// Moves a deleted entry back to the active state.
    fn restore_record(&self, id: &str) -> Result<()>;

    /// Removes an entry permanently, whatever its state.
    fn purge_record(&self, id: &str) -> Result<()>;

    /// Returns the entries matching a filter, sorted and paginated.
    fn search_records(&self, filter: &Filter) -> Result<Vec<Entry>>;

    /// Inserts or replaces a batch of entries.
    ///
    /// IDs are validated before anything is written. Existing entries keep
    /// their lifecycle state.
    fn load_records(&self, entries: Vec<Entry>) -> Result<()>;

    /// Opens the store, loading persisted state where there is any.
    fn open(&self) -> Result<()>;

    /// Persists pending changes.
    fn flush(&self) -> Result<()>;

    /// Flushes and releases the store.
    fn close(&self) -> Result<()>;

    /// Describes the store: implementation name, counts and location.
    fn info(&self) -> Result<BTreeMap<String, String>>;
}
