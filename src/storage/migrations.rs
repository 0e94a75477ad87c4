//! PostgreSQL migration system for schema management.
//!
//! Migrations are embedded in the binary, ordered by version and applied on
//! open. Each pending migration runs in its own transaction together with the
//! row recording it in the version table, so a failed migration leaves no
//! partial schema behind.
//!
//! # Usage
//!
//! ```rust,ignore
//! use knowstore::storage::migrations::{Migration, MigrationRunner};
//!
//! const MIGRATIONS: &[Migration] = &[
//!     Migration {
//!         version: 1,
//!         description: "Initial table",
//!         sql: "CREATE TABLE IF NOT EXISTS knowledge_entry (id UUID PRIMARY KEY);",
//!     },
//! ];
//!
//! let runner = MigrationRunner::new(pool, "knowledge_schema_version");
//! runner.run(MIGRATIONS).await?;
//! runner.validate(MIGRATIONS, "knowledge_entry", &["id"]).await?;
//! ```

use crate::{Error, Result};

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply (may contain multiple statements separated by semicolons).
    pub sql: &'static str,
}

/// Maximum version across a set of migrations.
#[must_use]
pub const fn max_version(migrations: &[Migration]) -> i32 {
    let mut max = 0;
    let mut i = 0;
    while i < migrations.len() {
        if migrations[i].version > max {
            max = migrations[i].version;
        }
        i += 1;
    }
    max
}

/// Migrations newer than `current`, in version order.
#[must_use]
pub fn pending(migrations: &[Migration], current: i32) -> Vec<&Migration> {
    let mut pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.version > current)
        .collect();
    pending.sort_by_key(|m| m.version);
    pending
}

/// Splits a migration script into its statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Checks a recorded schema against what this build expects.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the recorded version is behind the newest
/// migration, or a required column is absent.
pub fn check_schema<S: AsRef<str>>(
    recorded_version: i32,
    migrations: &[Migration],
    table: &str,
    columns: &[S],
    required: &[&str],
) -> Result<()> {
    let expected = max_version(migrations);
    if recorded_version < expected {
        return Err(Error::Schema(format!(
            "database schema version {recorded_version} is older than required version {expected}"
        )));
    }
    for column in required {
        if !columns.iter().any(|c| c.as_ref() == *column) {
            return Err(Error::Schema(format!(
                "required column '{column}' missing from {table} table"
            )));
        }
    }
    Ok(())
}

#[cfg(feature = "postgres")]
mod implementation {
    use super::{Migration, check_schema, pending, statements};
    use crate::{Error, Result};
    use deadpool_postgres::{Object, Pool};

    /// Applies migrations and validates the schema through a DDL-capable pool.
    pub struct MigrationRunner {
        pool: Pool,
        version_table: String,
    }

    impl MigrationRunner {
        /// Creates a runner recording versions in `version_table`.
        #[must_use]
        pub fn new(pool: Pool, version_table: impl Into<String>) -> Self {
            Self {
                pool,
                version_table: version_table.into(),
            }
        }

        /// Returns the version table name.
        #[must_use]
        pub fn version_table(&self) -> &str {
            &self.version_table
        }

        async fn client(&self) -> Result<Object> {
            self.pool
                .get()
                .await
                .map_err(|e| Error::operation("migration_get_connection", e))
        }

        /// Runs all pending migrations.
        ///
        /// # Errors
        ///
        /// Returns an error if a migration fails; that migration is rolled back.
        pub async fn run(&self, migrations: &[Migration]) -> Result<()> {
            let mut client = self.client().await?;
            self.ensure_version_table(&client).await?;
            let current = self.version_on(&client).await?;

            for migration in pending(migrations, current) {
                self.apply_migration(&mut client, migration).await?;
            }
            Ok(())
        }

        async fn ensure_version_table(&self, client: &Object) -> Result<()> {
            let sql = format!(
                r"
                CREATE TABLE IF NOT EXISTS {} (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    description TEXT NOT NULL
                )
                ",
                self.version_table
            );
            client
                .execute(&sql, &[])
                .await
                .map_err(|e| Error::operation("create_version_table", e))?;
            Ok(())
        }

        /// Returns the highest applied version, 0 without a version table.
        ///
        /// # Errors
        ///
        /// Returns an error if the database cannot be queried.
        pub async fn current_version(&self) -> Result<i32> {
            let client = self.client().await?;
            self.version_on(&client).await
        }

        async fn version_on(&self, client: &Object) -> Result<i32> {
            if !table_exists(client, &self.version_table).await? {
                return Ok(0);
            }
            let sql = format!("SELECT COALESCE(MAX(version), 0) FROM {}", self.version_table);
            let row = client
                .query_one(&sql, &[])
                .await
                .map_err(|e| Error::operation("get_schema_version", e))?;
            row.try_get(0)
                .map_err(|e| Error::operation("get_schema_version", e))
        }

        /// Checks the recorded version and the columns of `table`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Schema`] if the schema is behind this build or
        /// a required column is missing.
        pub async fn validate(
            &self,
            migrations: &[Migration],
            table: &str,
            required: &[&str],
        ) -> Result<()> {
            let client = self.client().await?;
            let version = self.version_on(&client).await?;

            let rows = client
                .query(
                    "SELECT column_name::text FROM information_schema.columns \
                     WHERE table_schema = current_schema() AND table_name = $1",
                    &[&table],
                )
                .await
                .map_err(|e| Error::operation("query_table_schema", e))?;
            let columns = rows
                .iter()
                .map(|row| row.try_get::<_, String>(0))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::operation("query_table_schema", e))?;

            check_schema(version, migrations, table, &columns, required)
        }

        /// Applies a single migration within a transaction.
        async fn apply_migration(&self, client: &mut Object, migration: &Migration) -> Result<()> {
            let tx = client.transaction().await.map_err(|e| {
                Error::operation(format!("migration_v{}_begin_tx", migration.version), e)
            })?;

            for statement in statements(migration.sql) {
                tx.execute(statement, &[]).await.map_err(|e| {
                    Error::operation(
                        format!("migration_v{}: {}", migration.version, migration.description),
                        e,
                    )
                })?;
            }

            let record_sql = format!(
                "INSERT INTO {} (version, description) VALUES ($1, $2)",
                self.version_table
            );
            tx.execute(&record_sql, &[&migration.version, &migration.description])
                .await
                .map_err(|e| Error::operation("record_migration", e))?;

            tx.commit().await.map_err(|e| {
                Error::operation(format!("migration_v{}_commit", migration.version), e)
            })?;

            tracing::info!(
                version = migration.version,
                description = migration.description,
                "Applied migration"
            );
            Ok(())
        }
    }

    async fn table_exists(client: &Object, table_name: &str) -> Result<bool> {
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1)",
                &[&table_name],
            )
            .await
            .map_err(|e| Error::operation("check_version_table", e))?;
        row.try_get(0)
            .map_err(|e| Error::operation("check_version_table", e))
    }
}

#[cfg(feature = "postgres")]
pub use implementation::MigrationRunner;
