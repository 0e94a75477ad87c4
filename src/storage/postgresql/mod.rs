//! PostgreSQL knowledge store.
//!
//! Records live in one `knowledge_entry` table keyed by `(account_id, id)`,
//! so several accounts can share a database. Two pools are kept: a CRUD pool
//! for everyday statements and a DDL pool, typically with more privileges,
//! used only for migrations and schema validation at open.
//!
//! Filters are compiled to parameterized SQL by [`compiler`]; the database
//! filters, sorts and paginates, and the shared sorter finishes the job for
//! fields SQL cannot order the same way.
//!
//! Requires the `postgres` feature. Without it [`PgStore`] is a stub whose
//! every operation returns [`crate::Error::FeatureNotEnabled`].

pub mod compiler;

use super::migrations::Migration;

/// Table recording applied migrations.
pub const VERSION_TABLE: &str = "knowledge_schema_version";

/// Columns the store reads and writes; validated after migrating.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "account_id",
    "category",
    "content_type",
    "content",
    "importance",
    "created_at",
    "updated_at",
    "expires_at",
    "source_id",
    "source_type",
    "owner_id",
    "owner_type",
    "subject_ids",
    "subject_type",
    "tags",
    "references",
    "metadata",
    "is_deleted",
];

/// Embedded schema migrations.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create knowledge_entry table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS knowledge_entry (
                account_id UUID NOT NULL,
                id UUID NOT NULL,
                category TEXT NOT NULL,
                content_type TEXT NOT NULL DEFAULT '',
                content BYTEA NOT NULL DEFAULT ''::bytea,
                importance INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ,
                source_id TEXT NOT NULL DEFAULT '',
                source_type TEXT NOT NULL DEFAULT '',
                owner_id TEXT NOT NULL DEFAULT '',
                owner_type TEXT NOT NULL DEFAULT '',
                subject_ids TEXT[] NOT NULL DEFAULT '{}',
                subject_type TEXT NOT NULL DEFAULT '',
                tags TEXT[] NOT NULL DEFAULT '{}',
                "references" JSONB NOT NULL DEFAULT '[]'::jsonb,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                PRIMARY KEY (account_id, id)
            );
            CREATE INDEX IF NOT EXISTS knowledge_entry_category_idx
                ON knowledge_entry (account_id, is_deleted, category);
            CREATE INDEX IF NOT EXISTS knowledge_entry_created_at_idx
                ON knowledge_entry (account_id, created_at DESC)
        "#,
    },
    Migration {
        version: 2,
        description: "Add GIN indexes for tags, subjects and metadata",
        sql: r#"
            CREATE INDEX IF NOT EXISTS knowledge_entry_tags_idx
                ON knowledge_entry USING GIN (tags);
            CREATE INDEX IF NOT EXISTS knowledge_entry_subject_ids_idx
                ON knowledge_entry USING GIN (subject_ids);
            CREATE INDEX IF NOT EXISTS knowledge_entry_metadata_idx
                ON knowledge_entry USING GIN (metadata)
        "#,
    },
];

#[cfg(feature = "postgres")]
mod implementation {
    use super::compiler::{self, SELECT_COLUMNS, SqlParam, TABLE};
    use super::{MIGRATIONS, REQUIRED_COLUMNS, VERSION_TABLE};
    use crate::config::PostgresSettings;
    use crate::models::{Category, Entry, Filter, Reference, truncate_time};
    use crate::query::{paginate, sort_entries};
    use crate::storage::memory::not_open;
    use crate::storage::metrics::record_operation_metrics;
    use crate::storage::migrations::MigrationRunner;
    use crate::storage::records::validate_batch_ids;
    use crate::storage::traits::KnowledgeStore;
    use crate::{Error, Result};
    use chrono::{DateTime, Utc};
    use deadpool_postgres::{Config, Pool, Runtime, Transaction};
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};
    use tokio::runtime::{Handle, RuntimeFlavor};
    use tokio_postgres::NoTls;
    use tokio_postgres::Row;
    use tokio_postgres::types::ToSql;
    use tracing::instrument;
    use uuid::Uuid;

    const BACKEND: &str = "postgres";

    /// Default maximum connections per pool.
    const DEFAULT_POOL_MAX_SIZE: usize = 20;

    const INSERT_COLUMNS: &str = "account_id, id, category, content_type, content, importance, \
         created_at, updated_at, expires_at, source_id, source_type, owner_id, owner_type, \
         subject_ids, subject_type, tags, \"references\", metadata";

    /// PostgreSQL-backed knowledge store.
    pub struct PgStore {
        crud: Pool,
        ddl: Pool,
        account_id: Uuid,
        query_timeout: Duration,
        opened: AtomicBool,
        // Owns the connection tasks spawned by the pools; see `block_on`.
        runtime: Option<tokio::runtime::Runtime>,
    }

    impl std::fmt::Debug for PgStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PgStore")
                .field("account_id", &self.account_id)
                .field("query_timeout", &self.query_timeout)
                .field("opened", &self.opened.load(Ordering::Acquire))
                .finish_non_exhaustive()
        }
    }

    /// Owned column values for one entry, in `INSERT_COLUMNS` order after the
    /// account id.
    struct EntryRow {
        id: Uuid,
        category: String,
        content_type: String,
        content: Vec<u8>,
        importance: i32,
        created_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        source_id: String,
        source_type: String,
        owner_id: String,
        owner_type: String,
        subject_ids: Vec<String>,
        subject_type: String,
        tags: Vec<String>,
        references: serde_json::Value,
        metadata: serde_json::Value,
    }

    impl EntryRow {
        fn from_entry(mut entry: Entry, now: DateTime<Utc>) -> Result<Self> {
            let id = parse_record_id(&entry.id)?;
            entry.truncate_timestamps();
            let references = serde_json::to_value(&entry.references)
                .map_err(|e| Error::operation("encode_references", e))?;
            let metadata = serde_json::to_value(&entry.metadata)
                .map_err(|e| Error::operation("encode_metadata", e))?;
            Ok(Self {
                id,
                category: entry.category.as_str().to_string(),
                content_type: entry.content_type,
                content: entry.content,
                importance: entry.importance,
                created_at: entry.created_at,
                updated_at: entry.updated_at.unwrap_or(now),
                expires_at: entry.expires_at,
                source_id: entry.source_id,
                source_type: entry.source_type,
                owner_id: entry.owner_id,
                owner_type: entry.owner_type,
                subject_ids: entry.subject_ids,
                subject_type: entry.subject_type,
                tags: entry.tags,
                references,
                metadata,
            })
        }

        /// Parameters `$1..=$18`; `created` stands in for an unset `created_at`.
        fn params<'a>(
            &'a self,
            account_id: &'a Uuid,
            created: &'a DateTime<Utc>,
        ) -> [&'a (dyn ToSql + Sync); 18] {
            let created_at: &(dyn ToSql + Sync) = match &self.created_at {
                Some(t) => t,
                None => created,
            };
            [
                account_id,
                &self.id,
                &self.category,
                &self.content_type,
                &self.content,
                &self.importance,
                created_at,
                &self.updated_at,
                &self.expires_at,
                &self.source_id,
                &self.source_type,
                &self.owner_id,
                &self.owner_type,
                &self.subject_ids,
                &self.subject_type,
                &self.tags,
                &self.references,
                &self.metadata,
            ]
        }
    }

    impl PgStore {
        /// Creates a store without touching the database.
        ///
        /// Call [`KnowledgeStore::open`] to migrate and validate the schema.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidInput`] if the account id is not a non-nil
        /// UUID or a URL cannot be parsed, and an error if the pools or the
        /// internal runtime cannot be created.
        pub fn new(settings: &PostgresSettings) -> Result<Self> {
            let account_id = Uuid::parse_str(settings.account_id.trim()).map_err(|e| {
                Error::InvalidInput(format!("account id '{}': {e}", settings.account_id))
            })?;
            if account_id.is_nil() {
                return Err(Error::InvalidInput("account id must not be the nil UUID".to_string()));
            }

            let crud = Self::create_pool(&settings.crud_url, settings.pool_max_size)?;
            let ddl = Self::create_pool(settings.ddl_url(), settings.pool_max_size)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("knowstore-pg")
                .enable_all()
                .build()
                .map_err(|e| Error::operation("postgres_create_runtime", e))?;

            Ok(Self {
                crud,
                ddl,
                account_id,
                query_timeout: settings.query_timeout(),
                opened: AtomicBool::new(false),
                runtime: Some(runtime),
            })
        }

        /// Creates a store and opens it.
        ///
        /// # Errors
        ///
        /// Returns an error if creation fails or the schema cannot be migrated
        /// or validated.
        pub fn connect(settings: &PostgresSettings) -> Result<Self> {
            let store = Self::new(settings)?;
            store.open()?;
            Ok(store)
        }

        /// Returns the account this store is scoped to.
        #[must_use]
        pub const fn account_id(&self) -> Uuid {
            self.account_id
        }

        fn create_pool(url: &str, pool_max_size: Option<usize>) -> Result<Pool> {
            let config = url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| Error::InvalidInput(format!("invalid PostgreSQL URL: {e}")))?;
            Self::build_pool_config(&config, pool_max_size)
                .create_pool(Some(Runtime::Tokio1), NoTls)
                .map_err(|e| Error::operation("postgres_create_pool", e))
        }

        #[cfg(unix)]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            match h {
                tokio_postgres::config::Host::Tcp(s) => s.clone(),
                tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
            }
        }

        #[cfg(not(unix))]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            let tokio_postgres::config::Host::Tcp(s) = h;
            s.clone()
        }

        /// Builds a deadpool config with bounded waits and fast recycling.
        fn build_pool_config(config: &tokio_postgres::Config, pool_max_size: Option<usize>) -> Config {
            let mut cfg = Config::new();
            cfg.host = config.get_hosts().first().map(Self::host_to_string);
            cfg.port = config.get_ports().first().copied();
            cfg.user = config.get_user().map(String::from);
            cfg.password = config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string());
            cfg.dbname = config.get_dbname().map(String::from);

            cfg.pool = Some(deadpool_postgres::PoolConfig {
                max_size: pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
                timeouts: deadpool_postgres::Timeouts {
                    wait: Some(Duration::from_secs(5)),
                    create: Some(Duration::from_secs(5)),
                    recycle: Some(Duration::from_secs(5)),
                },
                ..Default::default()
            });
            cfg.manager = Some(deadpool_postgres::ManagerConfig {
                recycling_method: deadpool_postgres::RecyclingMethod::Fast,
            });
            cfg
        }

        /// Runs a database future to completion under the query deadline.
        ///
        /// Futures run on the store's own runtime so pooled connections outlive
        /// any one call. Inside a multi-thread runtime the calling worker is
        /// handed to `block_in_place` first; a current-thread runtime cannot
        /// block and gets an error instead.
        fn block_on<F, T>(&self, operation: &'static str, f: F) -> Result<T>
        where
            F: Future<Output = Result<T>>,
        {
            let runtime = self
                .runtime
                .as_ref()
                .ok_or_else(|| not_open(operation))?;
            let deadline = self.query_timeout;
            let bounded = async move {
                tokio::time::timeout(deadline, f)
                    .await
                    .map_err(|_| Error::operation(operation, format!("timed out after {deadline:?}")))?
            };

            match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                    Err(Error::operation(
                        operation,
                        "cannot block inside a current-thread tokio runtime",
                    ))
                },
                Ok(_) => tokio::task::block_in_place(|| runtime.block_on(bounded)),
                Err(_) => runtime.block_on(bounded),
            }
        }

        /// Runs `op` with timing metrics, failing fast when the store is closed.
        fn run<F, T>(&self, operation: &'static str, f: F) -> Result<T>
        where
            F: Future<Output = Result<T>>,
        {
            if !self.opened.load(Ordering::Acquire) {
                return Err(not_open(operation));
            }
            let start = Instant::now();
            let result = self.block_on(operation, f);
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics(BACKEND, operation, start, status);
            result
        }

        async fn client(&self) -> Result<deadpool_postgres::Object> {
            self.crud
                .get()
                .await
                .map_err(|e| Error::operation("postgres_get_connection", e))
        }

        /// Inserts a row unless its ID is already taken, active or deleted.
        /// Returns whether a row was written.
        async fn insert(&self, tx: &Transaction<'_>, row: &EntryRow, now: DateTime<Utc>) -> Result<bool> {
            let sql = format!(
                "INSERT INTO {TABLE} ({INSERT_COLUMNS}) VALUES \
                 ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
                 ON CONFLICT (account_id, id) DO NOTHING"
            );
            let inserted = tx
                .execute(&sql, &row.params(&self.account_id, &now))
                .await
                .map_err(|e| Error::operation("postgres_insert", e))?;
            Ok(inserted == 1)
        }

        /// Overwrites an existing row's content, keeping its lifecycle state.
        /// `created_at` is kept when the row leaves it unset.
        async fn overwrite(
            &self,
            tx: &Transaction<'_>,
            row: &EntryRow,
            only_active: bool,
        ) -> Result<u64> {
            let mut sql = format!(
                "UPDATE {TABLE} SET category = $3, content_type = $4, content = $5, \
                 importance = $6, created_at = COALESCE($7, created_at), updated_at = $8, \
                 expires_at = $9, source_id = $10, source_type = $11, owner_id = $12, \
                 owner_type = $13, subject_ids = $14, subject_type = $15, tags = $16, \
                 \"references\" = $17, metadata = $18 \
                 WHERE account_id = $1 AND id = $2"
            );
            if only_active {
                sql.push_str(" AND is_deleted = FALSE");
            }
            let params: [&(dyn ToSql + Sync); 18] = [
                &self.account_id,
                &row.id,
                &row.category,
                &row.content_type,
                &row.content,
                &row.importance,
                &row.created_at,
                &row.updated_at,
                &row.expires_at,
                &row.source_id,
                &row.source_type,
                &row.owner_id,
                &row.owner_type,
                &row.subject_ids,
                &row.subject_type,
                &row.tags,
                &row.references,
                &row.metadata,
            ];
            tx.execute(&sql, &params)
                .await
                .map_err(|e| Error::operation("postgres_update", e))
        }

        /// Flips `is_deleted` from `from` to `!from`; returns rows changed.
        async fn set_deleted(&self, id: &Uuid, from: bool) -> Result<u64> {
            let client = self.client().await?;
            client
                .execute(
                    &format!(
                        "UPDATE {TABLE} SET is_deleted = $3 \
                         WHERE account_id = $1 AND id = $2 AND is_deleted = $4"
                    ),
                    &[&self.account_id, id, &!from, &from],
                )
                .await
                .map_err(|e| Error::operation("postgres_set_deleted", e))
        }

        async fn add_async(&self, entry: Entry) -> Result<()> {
            let now = truncate_time(Utc::now());
            let row = EntryRow::from_entry(entry, now)?;
            let mut client = self.client().await?;
            let tx = client
                .transaction()
                .await
                .map_err(|e| Error::operation("postgres_begin_tx", e))?;

            if !self.insert(&tx, &row, now).await? {
                return Err(Error::InvalidInput(format!(
                    "knowledge record with ID {} already exists",
                    row.id
                )));
            }

            tx.commit()
                .await
                .map_err(|e| Error::operation("postgres_commit", e))
        }

        async fn get_async(&self, id: &Uuid) -> Result<Option<Entry>> {
            let client = self.client().await?;
            let row = client
                .query_opt(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM {TABLE} \
                         WHERE account_id = $1 AND id = $2 AND is_deleted = FALSE"
                    ),
                    &[&self.account_id, id],
                )
                .await
                .map_err(|e| Error::operation("postgres_get", e))?;
            row.as_ref().map(row_to_entry).transpose()
        }

        async fn search_async(&self, filter: &Filter) -> Result<Vec<Entry>> {
            let query = compiler::build_search_query(filter, self.account_id)?;
            tracing::debug!(sql = %query.sql, params = query.params.len(), "compiled search");

            let params: Vec<&(dyn ToSql + Sync)> = query.params.iter().map(as_sql).collect();
            let client = self.client().await?;
            let rows = client
                .query(&query.sql, &params)
                .await
                .map_err(|e| Error::operation("postgres_search", e))?;
            let mut entries = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;

            if let Some((field, direction)) = query.client_sort {
                sort_entries(&mut entries, field.name(), direction);
                entries = paginate(entries, filter.offset, filter.limit);
            }
            Ok(entries)
        }

        async fn load_async(&self, rows: Vec<EntryRow>, now: DateTime<Utc>) -> Result<()> {
            let mut client = self.client().await?;
            let tx = client
                .transaction()
                .await
                .map_err(|e| Error::operation("postgres_begin_tx", e))?;

            for row in &rows {
                if !self.insert(&tx, row, now).await? {
                    self.overwrite(&tx, row, false).await?;
                }
            }

            tx.commit()
                .await
                .map_err(|e| Error::operation("postgres_commit", e))
        }

        async fn counts_async(&self) -> Result<(i64, i64)> {
            let client = self.client().await?;
            let row = client
                .query_one(
                    &format!(
                        "SELECT COUNT(*) FILTER (WHERE NOT is_deleted), \
                         COUNT(*) FILTER (WHERE is_deleted) \
                         FROM {TABLE} WHERE account_id = $1"
                    ),
                    &[&self.account_id],
                )
                .await
                .map_err(|e| Error::operation("postgres_count", e))?;
            let active = row.try_get(0).map_err(|e| Error::operation("postgres_count", e))?;
            let deleted = row.try_get(1).map_err(|e| Error::operation("postgres_count", e))?;
            Ok((active, deleted))
        }
    }

    impl Drop for PgStore {
        fn drop(&mut self) {
            // Dropping a runtime blocks, which panics inside async contexts.
            if let Some(runtime) = self.runtime.take() {
                runtime.shutdown_background();
            }
        }
    }

    impl KnowledgeStore for PgStore {
        #[instrument(skip(self, entry), fields(backend = BACKEND, id = %entry.id))]
        fn add_record(&self, entry: Entry) -> Result<()> {
            self.run("add", self.add_async(entry))?;
            tracing::debug!("record added");
            Ok(())
        }

        #[instrument(skip(self), fields(backend = BACKEND))]
        fn get_record(&self, id: &str) -> Result<Entry> {
            let uuid = parse_record_id(id)?;
            self.run("get", self.get_async(&uuid))?
                .ok_or_else(|| not_found(id, "active"))
        }

        #[instrument(skip(self, entry), fields(backend = BACKEND, id = %entry.id))]
        fn update_record(&self, entry: Entry) -> Result<()> {
            let id = entry.id.clone();
            let row = EntryRow::from_entry(entry, truncate_time(Utc::now()))?;
            let changed = self.run("update", async {
                let mut client = self.client().await?;
                let tx = client
                    .transaction()
                    .await
                    .map_err(|e| Error::operation("postgres_begin_tx", e))?;
                let changed = self.overwrite(&tx, &row, true).await?;
                tx.commit()
                    .await
                    .map_err(|e| Error::operation("postgres_commit", e))?;
                Ok(changed)
            })?;
            if changed == 0 {
                return Err(not_found(&id, "active"));
            }
            tracing::debug!("record updated");
            Ok(())
        }

        #[instrument(skip(self), fields(backend = BACKEND))]
        fn delete_record(&self, id: &str) -> Result<()> {
            let uuid = parse_record_id(id)?;
            if self.run("delete", self.set_deleted(&uuid, false))? == 0 {
                return Err(not_found(id, "active"));
            }
            tracing::debug!("record deleted");
            Ok(())
        }

        #[instrument(skip(self), fields(backend = BACKEND))]
        fn restore_record(&self, id: &str) -> Result<()> {
            let uuid = parse_record_id(id)?;
            if self.run("restore", self.set_deleted(&uuid, true))? == 0 {
                return Err(not_found(id, "deleted"));
            }
            tracing::debug!("record restored");
            Ok(())
        }

        #[instrument(skip(self), fields(backend = BACKEND))]
        fn purge_record(&self, id: &str) -> Result<()> {
            let uuid = parse_record_id(id)?;
            let removed = self.run("purge", async {
                let client = self.client().await?;
                client
                    .execute(
                        &format!("DELETE FROM {TABLE} WHERE account_id = $1 AND id = $2"),
                        &[&self.account_id, &uuid],
                    )
                    .await
                    .map_err(|e| Error::operation("postgres_purge", e))
            })?;
            if removed == 0 {
                return Err(not_found(id, "any"));
            }
            tracing::debug!("record purged");
            Ok(())
        }

        #[instrument(skip(self, filter), fields(backend = BACKEND))]
        fn search_records(&self, filter: &Filter) -> Result<Vec<Entry>> {
            self.run("search", self.search_async(filter))
        }

        #[instrument(skip(self, entries), fields(backend = BACKEND, count = entries.len()))]
        fn load_records(&self, entries: Vec<Entry>) -> Result<()> {
            validate_batch_ids(&entries)?;
            let now = truncate_time(Utc::now());
            let rows = entries
                .into_iter()
                .map(|entry| EntryRow::from_entry(entry, now))
                .collect::<Result<Vec<_>>>()?;
            let count = rows.len();
            self.run("load", self.load_async(rows, now))?;
            tracing::info!(count, "records loaded");
            Ok(())
        }

        fn open(&self) -> Result<()> {
            self.block_on("open", async {
                let runner = MigrationRunner::new(self.ddl.clone(), VERSION_TABLE);
                runner.run(MIGRATIONS).await?;
                runner.validate(MIGRATIONS, TABLE, REQUIRED_COLUMNS).await
            })?;
            self.opened.store(true, Ordering::Release);
            tracing::info!(backend = BACKEND, account_id = %self.account_id, "store opened");
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn close(&self) -> Result<()> {
            self.opened.store(false, Ordering::Release);
            tracing::info!(backend = BACKEND, "store closed");
            Ok(())
        }

        fn info(&self) -> Result<BTreeMap<String, String>> {
            let (active, deleted) = self.run("info", self.counts_async())?;
            Ok(BTreeMap::from([
                ("implementation".to_string(), "PostgreSQLStore".to_string()),
                ("account_id".to_string(), self.account_id.to_string()),
                ("record_count".to_string(), active.to_string()),
                ("deleted_count".to_string(), deleted.to_string()),
                ("persistent".to_string(), "true".to_string()),
            ]))
        }
    }

    fn not_found(id: &str, state: &'static str) -> Error {
        Error::NotFound {
            id: id.to_string(),
            state,
        }
    }

    fn parse_record_id(id: &str) -> Result<Uuid> {
        if id.is_empty() {
            return Err(Error::InvalidInput("knowledge record ID must not be empty".to_string()));
        }
        Uuid::parse_str(id)
            .map_err(|e| Error::InvalidInput(format!("knowledge record ID '{id}' is not a UUID: {e}")))
    }

    fn as_sql(param: &SqlParam) -> &(dyn ToSql + Sync) {
        match param {
            SqlParam::Text(v) => v,
            SqlParam::Bytes(v) => v,
            SqlParam::Float(v) => v,
            SqlParam::Int(v) => v,
            SqlParam::Time(v) => v,
            SqlParam::TextArray(v) => v,
            SqlParam::Json(v) => v,
            SqlParam::Uuid(v) => v,
        }
    }

    fn decode_error(e: impl std::fmt::Display) -> Error {
        Error::operation("postgres_decode_row", e)
    }

    /// Decodes a row selected with `SELECT_COLUMNS`.
    fn row_to_entry(row: &Row) -> Result<Entry> {
        let id: String = row.try_get(0).map_err(decode_error)?;
        let category: String = row.try_get(1).map_err(decode_error)?;
        let category = Category::parse(&category).unwrap_or_else(|| {
            tracing::warn!(id = %id, category = %category, "unknown category, using fact");
            Category::default()
        });

        let references: Option<serde_json::Value> = row.try_get(15).map_err(decode_error)?;
        let references: Vec<Reference> = match references {
            Some(value) => serde_json::from_value(value).map_err(decode_error)?,
            None => Vec::new(),
        };
        let metadata: Option<serde_json::Value> = row.try_get(16).map_err(decode_error)?;
        let metadata: BTreeMap<String, String> = match metadata {
            Some(value) => serde_json::from_value(value).map_err(decode_error)?,
            None => BTreeMap::new(),
        };

        let text = |idx: usize| -> Result<String> {
            row.try_get::<_, Option<String>>(idx)
                .map(Option::unwrap_or_default)
                .map_err(decode_error)
        };
        let list = |idx: usize| -> Result<Vec<String>> {
            row.try_get::<_, Option<Vec<String>>>(idx)
                .map(Option::unwrap_or_default)
                .map_err(decode_error)
        };

        Ok(Entry {
            id,
            category,
            content_type: text(2)?,
            content: row
                .try_get::<_, Option<Vec<u8>>>(3)
                .map_err(decode_error)?
                .unwrap_or_default(),
            importance: row
                .try_get::<_, Option<i32>>(4)
                .map_err(decode_error)?
                .unwrap_or_default(),
            created_at: row.try_get(5).map_err(decode_error)?,
            updated_at: row.try_get(6).map_err(decode_error)?,
            expires_at: row.try_get(7).map_err(decode_error)?,
            source_id: text(8)?,
            source_type: text(9)?,
            owner_id: text(10)?,
            owner_type: text(11)?,
            subject_ids: list(12)?,
            subject_type: text(13)?,
            tags: list(14)?,
            references,
            metadata,
        })
    }

}

#[cfg(not(feature = "postgres"))]
mod stub {
    use crate::config::PostgresSettings;
    use crate::models::{Entry, Filter};
    use crate::storage::traits::KnowledgeStore;
    use crate::{Error, Result};
    use std::collections::BTreeMap;

    /// PostgreSQL store stub (feature not enabled).
    #[derive(Debug)]
    pub struct PgStore;

    fn disabled<T>() -> Result<T> {
        Err(Error::FeatureNotEnabled("postgres".to_string()))
    }

    impl PgStore {
        /// Creates a new PostgreSQL store (stub).
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn new(_settings: &PostgresSettings) -> Result<Self> {
            disabled()
        }

        /// Creates and opens a PostgreSQL store (stub).
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn connect(_settings: &PostgresSettings) -> Result<Self> {
            disabled()
        }
    }

    impl KnowledgeStore for PgStore {
        fn add_record(&self, _entry: Entry) -> Result<()> {
            disabled()
        }

        fn get_record(&self, _id: &str) -> Result<Entry> {
            disabled()
        }

        fn update_record(&self, _entry: Entry) -> Result<()> {
            disabled()
        }

        fn delete_record(&self, _id: &str) -> Result<()> {
            disabled()
        }

        fn restore_record(&self, _id: &str) -> Result<()> {
            disabled()
        }

        fn purge_record(&self, _id: &str) -> Result<()> {
            disabled()
        }

        fn search_records(&self, _filter: &Filter) -> Result<Vec<Entry>> {
            disabled()
        }

        fn load_records(&self, _entries: Vec<Entry>) -> Result<()> {
            disabled()
        }

        fn open(&self) -> Result<()> {
            disabled()
        }

        fn flush(&self) -> Result<()> {
            disabled()
        }

        fn close(&self) -> Result<()> {
            disabled()
        }

        fn info(&self) -> Result<BTreeMap<String, String>> {
            disabled()
        }
    }

}

#[cfg(feature = "postgres")]
pub use implementation::PgStore;

#[cfg(not(feature = "postgres"))]
pub use stub::PgStore;
