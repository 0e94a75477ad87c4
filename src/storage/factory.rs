//! Builds a store from configuration.

use super::{FileStore, KnowledgeStore, MemoryStore, PgStore};
use crate::Result;
use crate::config::{BackendKind, KnowstoreConfig};

/// Creates and opens the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be created or opened, including
/// [`crate::Error::FeatureNotEnabled`] for PostgreSQL without the `postgres`
/// feature.
pub fn create_store(config: &KnowstoreConfig) -> Result<Box<dyn KnowledgeStore>> {
    tracing::debug!(backend = %config.backend, "creating store");
    let store: Box<dyn KnowledgeStore> = match config.backend {
        BackendKind::Memory => Box::new(MemoryStore::new()),
        BackendKind::File => Box::new(FileStore::open_path(&config.file.path)?),
        BackendKind::Postgres => Box::new(PgStore::connect(&config.postgres)?),
    };
    Ok(store)
}
