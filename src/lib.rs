//! # Knowstore
//!
//! A schema-light knowledge record store with a composable boolean filter DSL.
//!
//! Knowstore keeps [`Entry`] records behind one storage contract,
//! [`KnowledgeStore`], implemented by three interchangeable backends:
//!
//! - [`MemoryStore`]: volatile, two maps behind a read-write lock
//! - [`FileStore`]: the same logic persisted to a single JSON document with
//!   atomic write-then-rename flushes
//! - [`PgStore`]: PostgreSQL, with filters compiled to parameterized SQL
//!
//! All three honor the same filtering, sorting, soft-delete and pagination
//! semantics.
//!
//! ## Example
//!
//! ```rust
//! use knowstore::{Category, Condition, Entry, Filter, FilterGroup, KnowledgeStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.add_record(Entry::new("r1").with_category(Category::Fact).with_importance(75))?;
//! store.add_record(Entry::new("r2").with_category(Category::Decision).with_importance(50))?;
//!
//! let filter = Filter::new(FilterGroup::and(vec![
//!     Condition::new("Category", "=", "fact")?,
//!     Condition::new("Importance", ">=", 50)?,
//! ]));
//! let hits = store.search_records(&filter)?;
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].id, "r1");
//! # Ok::<(), knowstore::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod commands;
pub mod config;
pub mod models;
pub mod observability;
pub mod query;
pub mod storage;

pub use config::{BackendKind, KnowstoreConfig};
pub use models::{
    Category, Condition, Entry, Filter, FilterGroup, GroupOperator, Operator, Reference,
    SortDirection, Value,
};
pub use storage::{FileStore, KnowledgeStore, MemoryStore, PgStore};

/// Error type for knowstore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty or malformed IDs, duplicate IDs, bad filter operands for SQL |
/// | `NotFound` | Record absent, or not in the lifecycle state an operation needs |
/// | `OperationFailed` | File I/O, JSON, connection pool, driver or migration failures |
/// | `Schema` | Database schema behind the code or missing a required column |
/// | `FeatureNotEnabled` | Using the PostgreSQL backend without the `postgres` feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A record has an empty ID, or an ID the backend cannot store (non-UUID for SQL)
    /// - A record ID already exists (active or deleted) on add
    /// - A batch load contains duplicate IDs
    /// - A filter cannot be compiled to SQL (unknown field, unsupported operator,
    ///   operand of the wrong type)
    /// - A configuration value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record was not found in the state the operation requires.
    #[error("{state} knowledge record with ID {id} not found")]
    NotFound {
        /// The requested record ID.
        id: String,
        /// The lifecycle state that was searched (`active`, `deleted`, `any`).
        state: &'static str,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - Reading, writing or renaming the backing file fails
    /// - The backing file cannot be parsed
    /// - The store is not open
    /// - A database connection, query or migration fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The database schema is incompatible with this build.
    #[error("schema error: {0}")]
    Schema(String),

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns true if this error reports a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for knowstore operations.
pub type Result<T> = std::result::Result<T, Error>;
