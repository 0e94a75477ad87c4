//! Fixtures and scenarios shared by the backend test suites.
//!
//! Record IDs are UUIDs so the same scenarios run against every backend.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use knowstore::models::content_types;
use knowstore::{
    Category, Condition, Entry, Error, Filter, FilterGroup, KnowledgeStore, SortDirection, Value,
};

/// Deterministic UUID for fixture `n`; string order follows `n`.
pub fn id(n: u32) -> String {
    format!("00000000-0000-4000-8000-{n:012}")
}

/// Fixture time: 2024-01-01T00:00:00Z plus `hours`.
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

pub fn ids(entries: &[Entry]) -> Vec<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}

pub fn expect(ns: &[u32]) -> Vec<String> {
    ns.iter().map(|n| id(*n)).collect()
}

fn cond(field: &str, op: &str, value: impl Into<Value>) -> Condition {
    Condition::new(field, op, value).unwrap()
}

/// Four active records and one deleted one.
pub fn fixtures() -> Vec<Entry> {
    vec![
        Entry::new(id(1))
            .with_category(Category::Fact)
            .with_text("Use PostgreSQL 15")
            .with_importance(75)
            .with_tags(["db", "ops"])
            .with_subjects("user", ["u1"])
            .with_source("chat-1", "conversation")
            .with_owner("alice", "user")
            .with_reference(&id(2), "supersedes")
            .with_metadata("team", "ops")
            .with_metadata("env", "prod")
            .with_created_at(at(1))
            .with_updated_at(at(1)),
        Entry::new(id(2))
            .with_category(Category::Decision)
            .with_text("Adopt pgbouncer")
            .with_importance(50)
            .with_tags(["db"])
            .with_subjects("user", ["u1", "u2"])
            .with_owner("bob", "user")
            .with_metadata("team", "platform")
            .with_created_at(at(2))
            .with_updated_at(at(2))
            .with_expires_at(at(100)),
        Entry::new(id(3))
            .with_category(Category::Message)
            .with_text("hello 100% sure_thing")
            .with_importance(25)
            .with_source("10", "import")
            .with_created_at(at(3))
            .with_updated_at(at(3)),
        Entry::new(id(4))
            .with_category(Category::Action)
            .with_text("Rotated keys")
            .with_importance(100)
            .with_tags(["ops"])
            .with_source("9", "import")
            .with_owner("alice", "user")
            .with_metadata("team", "ops")
            .with_created_at(at(4))
            .with_updated_at(at(4)),
        Entry::new(id(5))
            .with_category(Category::Fact)
            .with_text("Old runbook")
            .with_tags(["archive"])
            .with_created_at(at(5))
            .with_updated_at(at(5)),
    ]
}

/// Adds the fixtures and soft-deletes record 5.
pub fn seed(store: &dyn KnowledgeStore) {
    for entry in fixtures() {
        store.add_record(entry).unwrap();
    }
    store.delete_record(&id(5)).unwrap();
}

/// Filters every backend must answer identically, with expected fixture numbers.
pub fn filter_cases() -> Vec<(&'static str, Filter, Vec<u32>)> {
    vec![
        ("empty", Filter::default(), vec![1, 2, 3, 4]),
        (
            "category eq",
            Filter::new(FilterGroup::and(vec![cond("Category", "=", "fact")])),
            vec![1],
        ),
        (
            "importance ge",
            Filter::new(FilterGroup::and(vec![cond("Importance", ">=", 50)])),
            vec![1, 2, 4],
        ),
        (
            "and",
            Filter::new(FilterGroup::and(vec![
                cond("Importance", ">", 50),
                cond("Tags", "CONTAINS", "ops"),
            ])),
            vec![1, 4],
        ),
        (
            "or",
            Filter::new(FilterGroup::or(vec![
                cond("Category", "=", "decision"),
                cond("Category", "=", "action"),
            ])),
            vec![2, 4],
        ),
        (
            "not single",
            Filter::new(FilterGroup::not(vec![cond("Category", "=", "fact")])),
            vec![2, 3, 4],
        ),
        (
            "not many",
            Filter::new(FilterGroup::not(vec![
                cond("Category", "=", "fact"),
                cond("Importance", ">=", 100),
            ])),
            vec![2, 3],
        ),
        (
            "nested",
            Filter::new(
                FilterGroup::and(vec![cond("Importance", ">=", 25)]).with_group(FilterGroup::or(
                    vec![cond("Tags", "CONTAINS", "ops"), cond("Category", "=", "message")],
                )),
            ),
            vec![1, 3, 4],
        ),
        (
            "empty nested group",
            Filter::new(
                FilterGroup::and(vec![cond("Category", "=", "fact")])
                    .with_group(FilterGroup::or(vec![])),
            ),
            vec![1],
        ),
        (
            "category ordering",
            Filter::new(FilterGroup::and(vec![cond("Category", ">", "decision")])),
            vec![1, 3],
        ),
        (
            "source id numeric or bytewise gt",
            Filter::new(FilterGroup::and(vec![cond("SourceID", ">", "9")])),
            vec![1, 3],
        ),
        (
            "source id numeric or bytewise le",
            Filter::new(FilterGroup::and(vec![cond("SourceID", "<=", "10")])),
            vec![2, 3, 4],
        ),
        (
            "importance eq string form",
            Filter::new(FilterGroup::and(vec![cond("Importance", "=", "75.0")])),
            vec![],
        ),
        (
            "importance ne string form",
            Filter::new(FilterGroup::and(vec![cond("Importance", "!=", "75.0")])),
            vec![1, 2, 3, 4],
        ),
        (
            "importance eq float",
            Filter::new(FilterGroup::and(vec![cond("Importance", "=", 75.0)])),
            vec![1],
        ),
        (
            "importance gt text",
            Filter::new(FilterGroup::and(vec![cond("Importance", ">", "5x")])),
            vec![1],
        ),
        (
            "tags contains",
            Filter::new(FilterGroup::and(vec![cond("Tags", "CONTAINS", "db")])),
            vec![1, 2],
        ),
        (
            "tags contains all",
            Filter::new(FilterGroup::and(vec![cond(
                "Tags",
                "CONTAINS",
                vec!["db", "ops"],
            )])),
            vec![1],
        ),
        (
            "subjects contains",
            Filter::new(FilterGroup::and(vec![cond("SubjectIDs", "CONTAINS", "u2")])),
            vec![2],
        ),
        (
            "references contains",
            Filter::new(FilterGroup::and(vec![cond("References", "CONTAINS", id(2))])),
            vec![1],
        ),
        (
            "content contains wildcard",
            Filter::new(FilterGroup::and(vec![cond("Content", "CONTAINS", "100%")])),
            vec![3],
        ),
        (
            "content contains underscore",
            Filter::new(FilterGroup::and(vec![cond("Content", "CONTAINS", "e_t")])),
            vec![3],
        ),
        (
            "content eq",
            Filter::new(FilterGroup::and(vec![cond("Content", "=", "Rotated keys")])),
            vec![4],
        ),
        (
            "owner eq",
            Filter::new(FilterGroup::and(vec![cond("OwnerID", "=", "alice")])),
            vec![1, 4],
        ),
        (
            "owner ne",
            Filter::new(FilterGroup::and(vec![cond("OwnerID", "!=", "alice")])),
            vec![2, 3],
        ),
        (
            "owner contains",
            Filter::new(FilterGroup::and(vec![cond("OwnerID", "CONTAINS", "lic")])),
            vec![1, 4],
        ),
        (
            "metadata eq subset",
            Filter::new(FilterGroup::and(vec![cond("Metadata", "=", [("team", "ops")])])),
            vec![1, 4],
        ),
        (
            "metadata ne",
            Filter::new(FilterGroup::and(vec![cond("Metadata", "!=", [("team", "ops")])])),
            vec![2, 3],
        ),
        (
            "metadata contains key",
            Filter::new(FilterGroup::and(vec![cond("Metadata", "CONTAINS", "env")])),
            vec![1],
        ),
        (
            "metadata contains any pair",
            Filter::new(FilterGroup::and(vec![cond(
                "Metadata",
                "CONTAINS",
                [("team", "platform"), ("env", "prod")],
            )])),
            vec![1, 2],
        ),
        (
            "created after",
            Filter::new(FilterGroup::and(vec![cond("CreatedAt", ">", at(2))])),
            vec![3, 4],
        ),
        (
            "created range",
            Filter::new(FilterGroup::and(vec![
                cond("CreatedAt", ">=", at(2)),
                cond("CreatedAt", "<=", at(3)),
            ])),
            vec![2, 3],
        ),
        (
            "created eq below microseconds",
            Filter::new(FilterGroup::and(vec![cond(
                "CreatedAt",
                "=",
                at(1) + Duration::nanoseconds(500),
            )])),
            vec![1],
        ),
        (
            "created gt below microseconds",
            Filter::new(FilterGroup::and(vec![cond(
                "CreatedAt",
                ">",
                at(1) + Duration::nanoseconds(500),
            )])),
            vec![2, 3, 4],
        ),
        (
            "expires before",
            Filter::new(FilterGroup::and(vec![cond("ExpiresAt", "<", at(200))])),
            vec![2],
        ),
        (
            "expires ne",
            Filter::new(FilterGroup::and(vec![cond("ExpiresAt", "!=", at(100))])),
            vec![1, 3, 4],
        ),
        (
            "id eq",
            Filter::new(FilterGroup::and(vec![cond("ID", "=", id(3))])),
            vec![3],
        ),
        (
            "include deleted",
            Filter::new(FilterGroup::and(vec![cond("Category", "=", "fact")])).include_deleted(),
            vec![1, 5],
        ),
        ("only deleted", Filter::default().only_deleted(), vec![5]),
        (
            "order importance desc",
            Filter::default().order_by("Importance", SortDirection::Desc),
            vec![4, 1, 2, 3],
        ),
        (
            "order created page",
            Filter::default()
                .order_by("CreatedAt", SortDirection::Asc)
                .with_offset(1)
                .with_limit(2),
            vec![2, 3],
        ),
        (
            "order category",
            Filter::default().order_by("category", SortDirection::Asc),
            vec![4, 2, 1, 3],
        ),
        (
            "order owner ties by id",
            Filter::default().order_by("OwnerID", SortDirection::Asc),
            vec![3, 1, 4, 2],
        ),
        (
            "order tags client side",
            Filter::default()
                .order_by("Tags", SortDirection::Asc)
                .with_limit(3),
            vec![3, 1, 2],
        ),
        (
            "offset past end",
            Filter::default().with_offset(10),
            vec![],
        ),
    ]
}

pub fn check_round_trip(store: &dyn KnowledgeStore) {
    let entry = Entry::new(id(42))
        .with_category(Category::Decision)
        .with_content(content_types::BINARY, vec![0_u8, 159, 146, 150])
        .with_importance(-3)
        .with_tags(["a", "b"])
        .with_subjects("team", ["t1"])
        .with_source("s1", "ticket")
        .with_owner("o1", "user")
        .with_reference(&id(1), "relates")
        .with_metadata("k", "v")
        .with_created_at(at(10))
        .with_updated_at(at(11))
        .with_expires_at(at(12));

    store.add_record(entry.clone()).unwrap();
    assert_eq!(store.get_record(&id(42)).unwrap(), entry);
}

pub fn check_timestamps_filled(store: &dyn KnowledgeStore) {
    let before = Utc::now() - Duration::seconds(1);
    store.add_record(Entry::new(id(43))).unwrap();
    let stored = store.get_record(&id(43)).unwrap();

    assert!(stored.created_at.unwrap() >= before);
    assert!(stored.updated_at.unwrap() >= before);
    assert!(stored.expires_at.is_none());
}

pub fn check_sub_microsecond_times(store: &dyn KnowledgeStore) {
    let fine = at(1) + Duration::nanoseconds(1_234_567);
    let micros = at(1) + Duration::microseconds(1_234);
    store
        .add_record(
            Entry::new(id(44))
                .with_created_at(fine)
                .with_updated_at(fine)
                .with_expires_at(fine),
        )
        .unwrap();

    let stored = store.get_record(&id(44)).unwrap();
    assert_eq!(stored.created_at, Some(micros));
    assert_eq!(stored.updated_at, Some(micros));
    assert_eq!(stored.expires_at, Some(micros));

    let exact = Filter::new(FilterGroup::and(vec![cond("CreatedAt", "=", fine)]));
    assert_eq!(ids(&store.search_records(&exact).unwrap()), expect(&[44]));
}

pub fn check_lifecycle(store: &dyn KnowledgeStore) {
    let rid = id(7);
    store
        .add_record(Entry::new(rid.clone()).with_updated_at(at(1)).with_created_at(at(1)))
        .unwrap();

    let dup = store.add_record(Entry::new(rid.clone())).unwrap_err();
    assert!(matches!(dup, Error::InvalidInput(_)), "{dup}");

    store.delete_record(&rid).unwrap();
    assert!(store.get_record(&rid).unwrap_err().is_not_found());
    assert!(matches!(
        store.add_record(Entry::new(rid.clone())),
        Err(Error::InvalidInput(_))
    ));
    assert!(store.delete_record(&rid).unwrap_err().is_not_found());
    assert!(
        store
            .update_record(Entry::new(rid.clone()))
            .unwrap_err()
            .is_not_found()
    );

    store.restore_record(&rid).unwrap();
    assert!(store.restore_record(&rid).unwrap_err().is_not_found());
    // delete and restore leave updated_at alone
    assert_eq!(store.get_record(&rid).unwrap().updated_at, Some(at(1)));

    store.purge_record(&rid).unwrap();
    assert!(store.get_record(&rid).unwrap_err().is_not_found());
    assert!(store.purge_record(&rid).unwrap_err().is_not_found());

    // purge works on deleted records too, and frees the ID
    store.add_record(Entry::new(rid.clone())).unwrap();
    store.delete_record(&rid).unwrap();
    store.purge_record(&rid).unwrap();
    store.add_record(Entry::new(rid)).unwrap();
}

pub fn check_update_keeps_created_at(store: &dyn KnowledgeStore) {
    let rid = id(8);
    store
        .add_record(Entry::new(rid.clone()).with_created_at(at(1)).with_updated_at(at(1)))
        .unwrap();

    store
        .update_record(
            Entry::new(rid.clone())
                .with_importance(90)
                .with_updated_at(at(6)),
        )
        .unwrap();
    let stored = store.get_record(&rid).unwrap();
    assert_eq!(stored.importance, 90);
    assert_eq!(stored.created_at, Some(at(1)));
    assert_eq!(stored.updated_at, Some(at(6)));

    let missing = store.update_record(Entry::new(id(999))).unwrap_err();
    assert!(missing.is_not_found());
}

pub fn check_empty_id_rejected(store: &dyn KnowledgeStore) {
    let err = store.add_record(Entry::new("")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err}");
}

pub fn check_filters(store: &dyn KnowledgeStore) {
    seed(store);
    for (name, filter, expected) in filter_cases() {
        let got = store
            .search_records(&filter)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(ids(&got), expect(&expected), "{name}");
    }
}

pub fn check_load(store: &dyn KnowledgeStore) {
    seed(store);

    let batch = vec![
        Entry::new(id(1)).with_importance(1).with_updated_at(at(9)),
        Entry::new(id(5)).with_text("Revised runbook"),
        Entry::new(id(6)).with_category(Category::Action),
    ];
    store.load_records(batch).unwrap();

    let updated = store.get_record(&id(1)).unwrap();
    assert_eq!(updated.importance, 1);
    assert_eq!(updated.created_at, Some(at(1)));

    // lifecycle state survives the load
    assert!(store.get_record(&id(5)).unwrap_err().is_not_found());
    let deleted = store.search_records(&Filter::default().only_deleted()).unwrap();
    assert_eq!(ids(&deleted), expect(&[5]));
    assert_eq!(deleted[0].content, b"Revised runbook");

    assert_eq!(store.get_record(&id(6)).unwrap().category, Category::Action);
}

pub fn check_load_is_validated_first(store: &dyn KnowledgeStore) {
    seed(store);

    let duplicate = vec![
        Entry::new(id(20)),
        Entry::new(id(1)).with_importance(0),
        Entry::new(id(20)),
    ];
    assert!(matches!(store.load_records(duplicate), Err(Error::InvalidInput(_))));

    let empty = vec![Entry::new(id(21)), Entry::new("")];
    assert!(matches!(store.load_records(empty), Err(Error::InvalidInput(_))));

    // nothing from the rejected batches was applied
    assert!(store.get_record(&id(20)).unwrap_err().is_not_found());
    assert!(store.get_record(&id(21)).unwrap_err().is_not_found());
    assert_eq!(store.get_record(&id(1)).unwrap().importance, 75);
}

pub fn check_info(store: &dyn KnowledgeStore) {
    seed(store);
    let info = store.info().unwrap();
    assert_eq!(info["record_count"], "4");
    assert_eq!(info["deleted_count"], "1");
    assert!(info.contains_key("implementation"));
    assert!(info.contains_key("persistent"));
}

/// The end-to-end scenario: add, query, soft-delete, restore, purge.
pub fn check_scenario(store: &dyn KnowledgeStore) {
    seed(store);

    let important = Filter::new(FilterGroup::and(vec![
        cond("Category", "=", "fact"),
        cond("Importance", ">=", 50),
    ]));
    assert_eq!(ids(&store.search_records(&important).unwrap()), expect(&[1]));

    store.delete_record(&id(1)).unwrap();
    assert!(store.search_records(&important).unwrap().is_empty());
    assert_eq!(
        ids(&store.search_records(&important.clone().include_deleted()).unwrap()),
        expect(&[1])
    );

    store.restore_record(&id(1)).unwrap();
    assert_eq!(ids(&store.search_records(&important).unwrap()), expect(&[1]));

    store.purge_record(&id(1)).unwrap();
    assert!(
        store
            .search_records(&important.include_deleted())
            .unwrap()
            .is_empty()
    );
}
