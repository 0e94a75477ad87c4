//! Property-based tests for record serialization and search invariants.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use knowstore::{
    Category, Condition, Entry, Filter, FilterGroup, KnowledgeStore, MemoryStore, SortDirection,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn arb_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::all().to_vec())
}

prop_compose! {
    fn arb_entry(index: usize)(
        category in arb_category(),
        importance in 0_i32..=100,
        content in prop::collection::vec(any::<u8>(), 0..32),
        tags in prop::collection::vec("[a-z]{1,6}", 0..4),
        metadata in prop::collection::btree_map("[a-z]{1,4}", "[a-z0-9]{0,6}", 0..3),
        created in 0_i64..1_000_000,
        expires in prop::option::of(0_i64..1_000_000),
    ) -> Entry {
        let mut entry = Entry::new(format!("r{index:04}"))
            .with_category(category)
            .with_content("application/octet-stream", content)
            .with_importance(importance)
            .with_tags(tags)
            .with_created_at(Utc.timestamp_opt(created, 0).unwrap())
            .with_updated_at(Utc.timestamp_opt(created, 0).unwrap());
        for (k, v) in metadata {
            entry = entry.with_metadata(k, v);
        }
        if let Some(at) = expires {
            entry = entry.with_expires_at(Utc.timestamp_opt(at, 0).unwrap());
        }
        entry
    }
}

fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
    (0_usize..12).prop_flat_map(|n| (0..n).map(arb_entry).collect::<Vec<_>>())
}

fn store_with(entries: &[Entry]) -> MemoryStore {
    let store = MemoryStore::new();
    store.load_records(entries.to_vec()).unwrap();
    store
}

fn id_set(entries: &[Entry]) -> HashSet<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}

proptest! {
    #[test]
    fn entry_json_round_trip(entry in arb_entry(0)) {
        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, entry);
    }

    #[test]
    fn not_is_the_complement(entries in arb_entries(), threshold in 0_i32..=100) {
        let store = store_with(&entries);
        let cond = || Condition::new("Importance", ">=", threshold).unwrap();

        let hits = store.search_records(&Filter::new(FilterGroup::and(vec![cond()]))).unwrap();
        let misses = store.search_records(&Filter::new(FilterGroup::not(vec![cond()]))).unwrap();

        let hits = id_set(&hits);
        let misses = id_set(&misses);
        prop_assert!(hits.is_disjoint(&misses));
        prop_assert_eq!(hits.len() + misses.len(), entries.len());
    }

    #[test]
    fn or_is_the_union(entries in arb_entries(), tag in "[a-z]{1,2}", level in 0_i32..=100) {
        let store = store_with(&entries);
        let by_tag = Condition::new("Tags", "CONTAINS", tag.as_str()).unwrap();
        let by_level = Condition::new("Importance", "<", level).unwrap();

        let either = store
            .search_records(&Filter::new(FilterGroup::or(vec![by_tag.clone(), by_level.clone()])))
            .unwrap();
        let left = store.search_records(&Filter::new(FilterGroup::and(vec![by_tag]))).unwrap();
        let right = store.search_records(&Filter::new(FilterGroup::and(vec![by_level]))).unwrap();

        let union: HashSet<String> = id_set(&left).union(&id_set(&right)).cloned().collect();
        prop_assert_eq!(id_set(&either), union);
    }

    #[test]
    fn pagination_bounds(entries in arb_entries(), offset in 0_usize..16, limit in 0_usize..16) {
        let store = store_with(&entries);
        let all = store
            .search_records(&Filter::default().order_by("CreatedAt", SortDirection::Desc))
            .unwrap();
        let page = store
            .search_records(
                &Filter::default()
                    .order_by("CreatedAt", SortDirection::Desc)
                    .with_offset(offset)
                    .with_limit(limit),
            )
            .unwrap();

        let remaining = entries.len().saturating_sub(offset);
        let expected = if limit == 0 { remaining } else { remaining.min(limit) };
        prop_assert_eq!(page.len(), expected);
        prop_assert_eq!(&page[..], &all[offset.min(all.len())..offset.min(all.len()) + expected]);
    }

    #[test]
    fn sorted_results_are_ordered(entries in arb_entries()) {
        let store = store_with(&entries);
        let sorted = store
            .search_records(&Filter::default().order_by("Importance", SortDirection::Asc))
            .unwrap();
        prop_assert!(sorted.windows(2).all(|w| w[0].importance <= w[1].importance));
    }

    #[test]
    fn metadata_eq_and_ne_partition(entries in arb_entries(), key in "[a-z]{1,2}", value in "[a-z0-9]{0,2}") {
        let store = store_with(&entries);
        let wanted = [(key.as_str(), value.as_str())];

        let eq = store
            .search_records(&Filter::new(FilterGroup::and(vec![
                Condition::new("Metadata", "=", wanted).unwrap(),
            ])))
            .unwrap();
        let ne = store
            .search_records(&Filter::new(FilterGroup::and(vec![
                Condition::new("Metadata", "!=", wanted).unwrap(),
            ])))
            .unwrap();

        prop_assert!(id_set(&eq).is_disjoint(&id_set(&ne)));
        prop_assert_eq!(eq.len() + ne.len(), entries.len());
    }
}
