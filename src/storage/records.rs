//! Active/deleted record maps and the lifecycle rules over them.
//!
//! Shared by [`MemoryStore`](super::MemoryStore) and
//! [`FileStore`](super::FileStore); the file backend serializes this type
//! as its on-disk document.

use crate::models::{Entry, Filter};
use crate::query::{matches, sort_and_paginate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Entries keyed by ID, split by lifecycle state.
///
/// An ID is never present in both maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Active entries.
    #[serde(default)]
    pub records: BTreeMap<String, Entry>,
    /// Soft-deleted entries.
    #[serde(default)]
    pub deleted_records: BTreeMap<String, Entry>,
}

impl RecordSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active entries.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.len()
    }

    /// Number of deleted entries.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.deleted_records.len()
    }

    /// Adds a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the ID is empty or already known.
    pub fn add(&mut self, mut entry: Entry, now: DateTime<Utc>) -> Result<()> {
        if entry.id.is_empty() {
            return Err(Error::InvalidInput(
                "knowledge record must have an ID".to_string(),
            ));
        }
        if self.records.contains_key(&entry.id) || self.deleted_records.contains_key(&entry.id) {
            return Err(Error::InvalidInput(format!(
                "knowledge record with ID {} already exists",
                entry.id
            )));
        }
        entry.fill_timestamps(now);
        self.records.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Returns a copy of an active entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is absent or deleted.
    pub fn get(&self, id: &str) -> Result<Entry> {
        self.records.get(id).cloned().ok_or_else(|| not_found(id, "active"))
    }

    /// Replaces an active entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is absent or deleted.
    pub fn update(&mut self, mut entry: Entry, now: DateTime<Utc>) -> Result<()> {
        let existing = self
            .records
            .get_mut(&entry.id)
            .ok_or_else(|| not_found(&entry.id, "active"))?;
        if entry.created_at.is_none() {
            entry.created_at = existing.created_at;
        }
        entry.fill_timestamps(now);
        *existing = entry;
        Ok(())
    }

    /// Moves an active entry to the deleted map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] unless the entry is active.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let entry = self.records.remove(id).ok_or_else(|| not_found(id, "active"))?;
        self.deleted_records.insert(id.to_string(), entry);
        Ok(())
    }

    /// Moves a deleted entry back to the active map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] unless the entry is deleted.
    pub fn restore(&mut self, id: &str) -> Result<()> {
        let entry = self
            .deleted_records
            .remove(id)
            .ok_or_else(|| not_found(id, "deleted"))?;
        self.records.insert(id.to_string(), entry);
        Ok(())
    }

    /// Removes an entry from whichever map holds it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if neither map holds the entry.
    pub fn purge(&mut self, id: &str) -> Result<()> {
        if self.records.remove(id).is_some() || self.deleted_records.remove(id).is_some() {
            Ok(())
        } else {
            Err(not_found(id, "any"))
        }
    }

    /// Returns matching entries, sorted and paginated per the filter.
    ///
    /// Candidates are visited in ascending ID order across both maps, so
    /// unsorted results are deterministic.
    #[must_use]
    pub fn search(&self, filter: &Filter) -> Vec<Entry> {
        let (active, deleted) = filter.visibility();
        let mut candidates: Vec<&Entry> = Vec::new();
        if active {
            candidates.extend(self.records.values());
        }
        if deleted {
            candidates.extend(self.deleted_records.values());
            if active {
                candidates.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }

        let hits = candidates
            .into_iter()
            .filter(|entry| matches(entry, &filter.root_group))
            .cloned()
            .collect();
        sort_and_paginate(hits, filter)
    }

    /// Inserts or replaces a batch of entries.
    ///
    /// All IDs are checked before any entry is written. An existing entry
    /// stays in its lifecycle state and keeps its creation time unless the
    /// input sets one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty or duplicated ID.
    pub fn load(&mut self, entries: Vec<Entry>, now: DateTime<Utc>) -> Result<()> {
        validate_batch_ids(&entries)?;

        for mut entry in entries {
            let target = if self.deleted_records.contains_key(&entry.id) {
                &mut self.deleted_records
            } else {
                &mut self.records
            };
            if entry.created_at.is_none() {
                entry.created_at = target.get(&entry.id).and_then(|e| e.created_at);
            }
            entry.fill_timestamps(now);
            target.insert(entry.id.clone(), entry);
        }
        Ok(())
    }
}

/// Rejects a batch containing an empty or repeated ID.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming the offending index or ID.
pub fn validate_batch_ids(entries: &[Entry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if entry.id.is_empty() {
            return Err(Error::InvalidInput(format!(
                "record at index {index} must have an ID"
            )));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(Error::InvalidInput(format!(
                "duplicate record ID found in input: {}",
                entry.id
            )));
        }
    }
    Ok(())
}

fn not_found(id: &str, state: &'static str) -> Error {
    Error::NotFound {
        id: id.to_string(),
        state,
    }
}
