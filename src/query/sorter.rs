//! Sorting and pagination of search results.

use super::field::{Field, FieldValue};
use crate::models::{Entry, Filter, SortDirection};
use std::cmp::Ordering;

/// Stable-sorts entries by the named field.
///
/// Strings compare lexicographically, integers numerically and timestamps
/// chronologically with unset times first. Other fields compare by their
/// string form. An unknown field leaves the order unchanged.
pub fn sort_entries(entries: &mut [Entry], order_by: &str, dir: SortDirection) {
    let Some(field) = Field::parse(order_by) else {
        return;
    };
    entries.sort_by(|a, b| {
        let ordering = compare_field(&field.value(a), &field.value(b));
        match dir {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare_field(a: &FieldValue<'_>, b: &FieldValue<'_>) -> Ordering {
    match (a, b) {
        (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
        (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
        (FieldValue::Time(a), FieldValue::Time(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Applies offset then limit; zero disables either.
#[must_use]
pub fn paginate(mut entries: Vec<Entry>, offset: usize, limit: usize) -> Vec<Entry> {
    if offset > 0 {
        entries.drain(..offset.min(entries.len()));
    }
    if limit > 0 {
        entries.truncate(limit);
    }
    entries
}

/// Sorts per the filter's ordering, then paginates.
#[must_use]
pub fn sort_and_paginate(mut entries: Vec<Entry>, filter: &Filter) -> Vec<Entry> {
    if let Some(order_by) = filter.order_by.as_deref() {
        sort_entries(&mut entries, order_by, filter.order_dir);
    }
    paginate(entries, filter.offset, filter.limit)
}
