//! Integration tests for knowstore.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::doc_markdown)]

use knowstore::commands::{self, EntryArgs, SearchArgs};
use knowstore::config::{BackendKind, KnowstoreConfig, LogFormat};
use knowstore::storage::create_store;
use knowstore::{Entry, Error};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_error_types() {
    let err = Error::InvalidInput("test message".to_string());
    let display = format!("{err}");
    assert!(display.contains("invalid input"));
    assert!(display.contains("test message"));

    let err = Error::OperationFailed {
        operation: "read".to_string(),
        cause: "file not found".to_string(),
    };
    let display = format!("{err}");
    assert!(display.contains("read"));
    assert!(display.contains("file not found"));

    let err = Error::FeatureNotEnabled("postgres".to_string());
    let display = format!("{err}");
    assert!(display.contains("not enabled"));
    assert!(display.contains("--features postgres"));
}

#[test]
fn test_config_file_selects_file_backend() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data").join("knowledge.json");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "backend = \"file\"\n\n[file]\npath = {:?}\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
            data.display().to_string()
        ),
    )
    .unwrap();

    let config = KnowstoreConfig::load_from_file(&config_path).unwrap();
    assert_eq!(config.backend, BackendKind::File);
    assert_eq!(config.file.path, data);
    assert_eq!(config.logging.format, LogFormat::Json);

    let store = create_store(&config).unwrap();
    store.add_record(Entry::new("a")).unwrap();
    store.close().unwrap();
    assert!(data.exists());
}

#[test]
fn test_overrides_win_over_file() {
    let config = KnowstoreConfig::from_toml("backend = \"file\"\n")
        .unwrap()
        .with_overrides(|key| match key {
            "KNOWSTORE_BACKEND" => Some("memory".to_string()),
            "KNOWSTORE_PG_QUERY_TIMEOUT" => Some("7".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.backend, BackendKind::Memory);
    assert_eq!(config.postgres.query_timeout_secs, 7);

    let err = KnowstoreConfig::new()
        .with_overrides(|key| (key == "KNOWSTORE_BACKEND").then(|| "sqlite".to_string()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

/// Each step opens a fresh store over the same file, like separate CLI runs.
#[test]
fn test_command_workflow_across_invocations() {
    let dir = TempDir::new().unwrap();
    let config = KnowstoreConfig::new()
        .with_backend(BackendKind::File)
        .with_file_path(dir.path().join("knowledge.json"));

    let run = |f: &dyn Fn(&dyn knowstore::KnowledgeStore) -> knowstore::Result<serde_json::Value>| {
        let store = create_store(&config).unwrap();
        let out = f(store.as_ref());
        store.close().unwrap();
        out
    };

    let add = EntryArgs {
        id: Some("r1".to_string()),
        category: "decision".to_string(),
        content: Some("Adopt pgbouncer".to_string()),
        content_type: "text/plain".to_string(),
        importance: 80,
        tags: vec!["db".to_string()],
        ..EntryArgs::default()
    };
    run(&|store| commands::cmd_add(store, add.to_entry()?)).unwrap();
    run(&|store| {
        commands::cmd_add(
            store,
            Entry::new("r2").with_importance(10).with_tag("db"),
        )
    })
    .unwrap();

    let search = SearchArgs {
        conditions: vec!["Tags CONTAINS db".to_string()],
        order_by: Some("Importance".to_string()),
        desc: true,
        ..SearchArgs::default()
    };
    let out = run(&|store| commands::cmd_search(store, &search.to_filter()?)).unwrap();
    let ids: Vec<&str> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["r1", "r2"]);

    run(&|store| commands::cmd_delete(store, "r1")).unwrap();
    let err = run(&|store| commands::cmd_get(store, "r1")).unwrap_err();
    assert!(err.is_not_found());

    let info = run(&|store| commands::cmd_info(store)).unwrap();
    assert_eq!(info["record_count"], "1");
    assert_eq!(info["deleted_count"], "1");
}

#[test]
fn test_load_command_rejects_duplicates() {
    let dir = TempDir::new().unwrap();
    let batch = dir.path().join("batch.json");
    fs::write(&batch, r#"[{"id": "a"}, {"id": "a"}]"#).unwrap();

    let store = create_store(&KnowstoreConfig::new()).unwrap();
    let err = commands::cmd_load(store.as_ref(), &batch).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.info().unwrap()["record_count"], "0");
}
